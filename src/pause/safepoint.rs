//! Cooperative stop-the-world
//!
//! Mutator threads register with a [`Safepoint`] and call
//! [`MutatorHandle::poll`] at points where they hold no partially updated
//! graph state and no lock on scanned data. A pause request raises a flag,
//! then waits until every registered mutator has parked in `poll`.
//!
//! ## Guarantees
//! - Fast path of `poll` is a single atomic load
//! - Only one pause is active at a time; a second request waits
//! - A mutator registering during a pause blocks until the pause ends
//! - The thread requesting the pause must not hold a `MutatorHandle`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use super::WorldPause;

#[derive(Debug, Default)]
struct State {
    registered: usize,
    parked: usize,
    stopped: bool,
}

/// Coordinates stop-the-world pauses across registered mutator threads.
#[derive(Debug, Default)]
pub struct Safepoint {
    state: Mutex<State>,
    /// Mirrors `State::stopped` for the lock-free poll
    pending: AtomicBool,
    changed: Condvar,
}

impl Safepoint {
    /// Create a safepoint with no registered mutators.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register the calling thread as a mutator.
    pub fn register(self: &Arc<Self>) -> MutatorHandle {
        let mut state = self.state.lock();
        while state.stopped {
            self.changed.wait(&mut state);
        }
        state.registered += 1;
        MutatorHandle {
            safepoint: Arc::clone(self),
        }
    }

    /// Number of registered mutators.
    pub fn registered(&self) -> usize {
        self.state.lock().registered
    }

    /// Whether a pause is in effect.
    pub fn is_stopped(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    #[cold]
    fn park(&self) {
        let mut state = self.state.lock();
        if !state.stopped {
            return;
        }
        state.parked += 1;
        self.changed.notify_all();
        while state.stopped {
            self.changed.wait(&mut state);
        }
        state.parked -= 1;
    }

    fn unregister(&self) {
        let mut state = self.state.lock();
        state.registered -= 1;
        self.changed.notify_all();
    }
}

impl WorldPause for Safepoint {
    fn stop_the_world(&self) {
        let mut state = self.state.lock();
        while state.stopped {
            self.changed.wait(&mut state);
        }
        state.stopped = true;
        self.pending.store(true, Ordering::Release);
        while state.parked < state.registered {
            self.changed.wait(&mut state);
        }
        debug!(mutators = state.registered, "world stopped");
    }

    fn start_the_world(&self) {
        let mut state = self.state.lock();
        state.stopped = false;
        self.pending.store(false, Ordering::Release);
        self.changed.notify_all();
        debug!("world started");
    }
}

/// Registration of one mutator thread; unregisters on drop.
#[derive(Debug)]
pub struct MutatorHandle {
    safepoint: Arc<Safepoint>,
}

impl MutatorHandle {
    /// Park here if a pause is pending.
    #[inline]
    pub fn poll(&self) {
        if self.safepoint.pending.load(Ordering::Acquire) {
            self.safepoint.park();
        }
    }
}

impl Drop for MutatorHandle {
    fn drop(&mut self) {
        self.safepoint.unregister();
    }
}
