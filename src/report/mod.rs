//! Report store for presentation layers
//!
//! Triggers scans of named roots and keeps every result as an immutable,
//! numbered report.

mod store;

pub use store::{Report, ReportId, ReportStore, ReportSummary};
