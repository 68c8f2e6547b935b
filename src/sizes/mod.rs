//! Scan results
//!
//! Totals per type plus the grand total, and the text report rendered from
//! them.

mod aggregator;
mod human;

pub use aggregator::SizeAggregator;
pub use human::human_size;

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};

use crate::reflect::TypeInfo;

/// Identity of a type in a report.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T`.
    pub fn of<T: crate::Reflect>() -> Self {
        TypeInfo::of::<T>().into()
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl From<TypeInfo> for TypeKey {
    fn from(info: TypeInfo) -> Self {
        Self {
            id: info.id(),
            name: info.name(),
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Running byte total and instance count for one type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TypeSize {
    /// Bytes attributed to the type.
    pub total: usize,
    /// Instances attributed to the type.
    pub count: usize,
}

/// Result of a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sizes {
    /// Bytes reachable from the root, each counted once.
    pub total: usize,
    /// Breakdown by exact dynamic type.
    pub by_type: HashMap<TypeKey, TypeSize>,
    /// Bitmap memory the scan allocated (diagnostics of the scanner itself).
    pub bitmap_size: usize,
    /// Fraction of allocated bitmap bits that were set.
    pub bitmap_utilization: f32,
}

/// One line of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReportRow {
    /// Type name, or `ALL` for the grand total.
    pub name: &'static str,
    /// Instance count.
    pub count: usize,
    /// Bytes.
    pub total: usize,
}

impl Sizes {
    /// Entry for `T`, if any instance was attributed to it.
    pub fn get<T: crate::Reflect>(&self) -> Option<TypeSize> {
        self.by_type.get(&TypeKey::of::<T>()).copied()
    }

    /// Instances attributed over all types.
    pub fn count(&self) -> usize {
        self.by_type.values().map(|size| size.count).sum()
    }

    /// Report rows: `ALL` first, then types by descending total.
    pub fn rows(&self) -> Vec<ReportRow> {
        let mut types: Vec<ReportRow> = self
            .by_type
            .iter()
            .map(|(key, size)| ReportRow {
                name: key.name(),
                count: size.count,
                total: size.total,
            })
            .collect();
        types.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(b.name)));

        let mut rows = Vec::with_capacity(types.len() + 1);
        rows.push(ReportRow {
            name: "ALL",
            count: self.count(),
            total: self.total,
        });
        rows.extend(types);
        rows
    }

    /// Human-readable table of the rows.
    pub fn report(&self) -> String {
        let rows = self.rows();
        let sizes: Vec<String> = rows.iter().map(|row| human_size(row.total)).collect();
        let name_width = rows.iter().map(|row| row.name.len()).max().unwrap_or(0);
        let count_width = rows
            .iter()
            .map(|row| row.count.to_string().len())
            .max()
            .unwrap_or(0);
        let size_width = sizes.iter().map(String::len).max().unwrap_or(0);

        let mut out = String::new();
        for (row, size) in rows.iter().zip(&sizes) {
            let _ = writeln!(
                out,
                "{:<name_width$}  {:>count_width$}  {:>size_width$}",
                row.name, row.count, size
            );
        }
        out
    }

    /// Digest of the report rows; equal for scans of an unchanged graph.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for row in self.rows() {
            hasher.update(row.name.as_bytes());
            hasher.update(&row.count.to_le_bytes());
            hasher.update(&row.total.to_le_bytes());
        }
        hasher.finalize()
    }
}
