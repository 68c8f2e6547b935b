//! Size accumulation during a scan

use std::collections::HashMap;

use super::{Sizes, TypeKey, TypeSize};
use crate::reflect::TypeInfo;

/// Accumulates the grand total and per-type totals as subtrees complete.
#[derive(Debug, Default)]
pub struct SizeAggregator {
    total: usize,
    by_type: HashMap<TypeKey, TypeSize>,
}

impl SizeAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self {
            total: 0,
            by_type: HashMap::new(),
        }
    }

    /// Attribute `size` bytes to one instance of `info`.
    pub fn add(&mut self, info: TypeInfo, size: usize) {
        self.total += size;
        let entry = self.by_type.entry(info.into()).or_default();
        entry.total += size;
        entry.count += 1;
    }

    /// Grand total so far
    pub fn total(&self) -> usize {
        self.total
    }

    /// Snapshot of the totals so far (bitmap statistics left at zero).
    pub fn report(&self) -> Sizes {
        Sizes {
            total: self.total,
            by_type: self.by_type.clone(),
            ..Sizes::default()
        }
    }
}
