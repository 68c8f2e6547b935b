//! Shape classification
//!
//! Decides per type whether its values can reference memory outside their
//! own footprint. Self-contained types are sized in O(1) without a walk.

use std::any::TypeId;
use std::collections::HashMap;

use crate::reflect::{Shape, TypeInfo};

/// Per-scan memo of `needs_scan` results and shapes, keyed by type.
#[derive(Debug, Default)]
pub struct Classifier {
    cache: HashMap<TypeId, bool>,
    shapes: HashMap<TypeId, Shape>,
}

impl Classifier {
    /// Create an empty classifier.
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            shapes: HashMap::new(),
        }
    }

    /// Structural definition of `info`, built once per type.
    pub fn shape(&mut self, info: TypeInfo) -> &Shape {
        self.shapes.entry(info.id()).or_insert_with(|| info.shape())
    }

    /// Whether values of `info` must be traversed.
    ///
    /// Aggregates and arrays inherit from their members; scalars never need
    /// a scan; every kind with indirect storage always does.
    pub fn needs_scan(&mut self, info: TypeInfo) -> bool {
        if let Some(&cached) = self.cache.get(&info.id()) {
            return cached;
        }
        let result = match info.shape() {
            Shape::Scalar => false,
            Shape::Aggregate(members) => members.into_iter().any(|member| self.needs_scan(member)),
            Shape::Array { elem, len } => len > 0 && self.needs_scan(elem),
            Shape::Text
            | Shape::Callable
            | Shape::Sequence { .. }
            | Shape::Map { .. }
            | Shape::Queue { .. }
            | Shape::Pointer { .. }
            | Shape::Dynamic => true,
        };
        self.cache.insert(info.id(), result);
        result
    }

    /// Number of types classified so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
