//! World pause around a scan
//!
//! The walker assumes the graph does not change under it. A [`WorldPause`]
//! is the host's way of guaranteeing that: every other mutator is halted
//! between `stop_the_world` and `start_the_world`.

mod safepoint;

pub use safepoint::{MutatorHandle, Safepoint};

use std::fmt;

/// Host primitive that halts and resumes all other mutators of the graph.
pub trait WorldPause: Send + Sync + fmt::Debug {
    /// Block until no other thread can mutate the graph.
    fn stop_the_world(&self);

    /// Let halted mutators run again.
    fn start_the_world(&self);
}

/// The embedding program has already quiesced its mutators.
///
/// Stopping and starting are no-ops; consistency is the caller's duty.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quiesced;

impl WorldPause for Quiesced {
    fn stop_the_world(&self) {}

    fn start_the_world(&self) {}
}

/// Releases the pause when dropped, including during unwinding.
struct PauseGuard<'a> {
    pause: &'a dyn WorldPause,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.pause.start_the_world();
    }
}

/// Run `f` with the world stopped; the world is restarted on every exit path.
pub fn with_world_paused<R>(pause: &dyn WorldPause, f: impl FnOnce() -> R) -> R {
    pause.stop_the_world();
    let _guard = PauseGuard { pause };
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingPause {
        stops: AtomicUsize,
        starts: AtomicUsize,
    }

    impl WorldPause for CountingPause {
        fn stop_the_world(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn start_the_world(&self) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_pause_brackets_closure() {
        let pause = CountingPause::default();
        let seen = with_world_paused(&pause, || {
            (
                pause.stops.load(Ordering::SeqCst),
                pause.starts.load(Ordering::SeqCst),
            )
        });
        assert_eq!(seen, (1, 0));
        assert_eq!(pause.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pause_released_on_panic() {
        let pause = CountingPause::default();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            with_world_paused(&pause, || panic!("scan failed"))
        }));
        assert!(result.is_err());
        assert_eq!(pause.stops.load(Ordering::SeqCst), 1);
        assert_eq!(pause.starts.load(Ordering::SeqCst), 1);
    }
}
