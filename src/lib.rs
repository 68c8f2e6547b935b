//! # Live memory accounting for in-process object graphs
//!
//! Given a root value, `memsize` answers "how much memory is reachable from
//! here, and what is it made of?" Shared and cyclic references are handled:
//! no byte is ever counted twice.
//!
//! ## Components
//!
//! 1. **Address set**: sparse bitmap of byte ranges already counted
//! 2. **Classifier**: per type, whether values can own indirect memory
//! 3. **Walker**: recursive traversal with one handler per structural kind
//! 4. **Aggregator**: grand total and per-type (bytes, count)
//! 5. **Pause**: stop-the-world bracket guaranteeing a stable graph
//!
//! ## Usage Example
//!
//! ```
//! use std::sync::Arc;
//! use memsize::reflect_struct;
//!
//! struct Cache {
//!     entries: Vec<Arc<String>>,
//! }
//!
//! reflect_struct!(Cache { entries });
//!
//! let shared = Arc::new("hello".to_string());
//! let cache = Cache { entries: vec![Arc::clone(&shared), shared] };
//! let sizes = memsize::scan(&cache, &["cache"]);
//!
//! // The shared string is counted once.
//! assert_eq!(sizes.get::<String>().map(|s| s.count), Some(1));
//! println!("{}", sizes.report());
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![forbid(unsafe_code)]

// Core modules - one per scanner component
pub mod bitmap;   // Visited-address tracking
pub mod classify; // Shape classification
pub mod pause;    // Stop-the-world coordination
pub mod reflect;  // Type introspection
pub mod sizes;    // Scan results and reports
pub mod walker;   // Graph traversal

// Collaborators around the core
pub mod report;   // Report store for presentation layers
pub mod roots;    // Named root registry

// Re-exports for convenience
pub use pause::{with_world_paused, MutatorHandle, Quiesced, Safepoint, WorldPause};
pub use reflect::{Address, Kind, Member, Members, Reflect, Shape, TypeInfo, Typed};
pub use report::{Report, ReportId, ReportStore, ReportSummary};
pub use roots::{Root, RootSet};
pub use sizes::{human_size, ReportRow, Sizes, TypeKey, TypeSize};

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use walker::Walker;

/// Errors surfaced to callers of the scanner and its collaborators
#[derive(Error, Debug)]
pub enum MemsizeError {
    /// No root registered under this name
    #[error("unknown root: {0}")]
    UnknownRoot(String),

    /// Scan configuration rejected
    #[error("invalid scan configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration parameters for a scanner
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Each bitmap chunk covers `2^chunk_bits` bytes of address space
    pub chunk_bits: u32,

    /// Pauses longer than this are logged as warnings
    pub pause_warning: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk_bits: bitmap::DEFAULT_CHUNK_BITS,
            pause_warning: Duration::from_millis(100),
        }
    }
}

impl ScanConfig {
    /// Use bitmap chunks of `2^chunk_bits` bytes.
    pub fn with_chunk_bits(mut self, chunk_bits: u32) -> Self {
        self.chunk_bits = chunk_bits;
        self
    }

    /// Warn about pauses longer than `threshold`.
    pub fn with_pause_warning(mut self, threshold: Duration) -> Self {
        self.pause_warning = threshold;
        self
    }

    /// Check the configuration before use.
    pub fn validate(&self) -> Result<(), MemsizeError> {
        let range = bitmap::MIN_CHUNK_BITS..=bitmap::MAX_CHUNK_BITS;
        if !range.contains(&self.chunk_bits) {
            return Err(MemsizeError::InvalidConfig(format!(
                "chunk_bits {} outside {}..={}",
                self.chunk_bits,
                range.start(),
                range.end()
            )));
        }
        Ok(())
    }
}

/// Scan orchestrator
///
/// Pauses the world, walks the graph from the root, resumes the world and
/// returns the totals. Every scan starts from empty state.
#[derive(Debug, Clone)]
pub struct Scanner {
    config: ScanConfig,
    pause: Arc<dyn WorldPause>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            config: ScanConfig::default(),
            pause: Arc::new(Quiesced),
        }
    }
}

impl Scanner {
    /// Create a scanner that brackets each scan with `pause`.
    pub fn new(config: ScanConfig, pause: Arc<dyn WorldPause>) -> Result<Self, MemsizeError> {
        config.validate()?;
        Ok(Self { config, pause })
    }

    /// Active configuration
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Account for all memory reachable from `root`.
    ///
    /// `path` labels the root in trace output. The root is charged to its
    /// exact dynamic type; the reference itself is not charged.
    pub fn scan(&self, root: &dyn Reflect, path: &[&str]) -> Sizes {
        debug!(root = root.type_info().name(), path = %path.join("."), "scan starting");
        let started = Instant::now();
        let sizes = with_world_paused(self.pause.as_ref(), || {
            let mut walker = Walker::new(self.config.chunk_bits, path);
            walker.scan(Address::of(root), root, true);
            walker.finish()
        });
        let paused = started.elapsed();

        if paused > self.config.pause_warning {
            warn!(?paused, threshold = ?self.config.pause_warning, "world pause exceeded threshold");
        }
        debug!(
            total = sizes.total,
            types = sizes.by_type.len(),
            bitmap_size = sizes.bitmap_size,
            bitmap_utilization = sizes.bitmap_utilization,
            ?paused,
            "scan complete"
        );
        sizes
    }
}

/// Scan `root` assuming the caller has already quiesced all mutators.
pub fn scan<T: Reflect>(root: &T, path: &[&str]) -> Sizes {
    Scanner::default().scan(root, path)
}
