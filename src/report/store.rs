use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use tracing::info;

use crate::{MemsizeError, RootSet, Scanner, Sizes};

/// Report identifier; assigned from 0 upwards.
pub type ReportId = usize;

/// Result of one triggered scan.
#[derive(Debug, Clone)]
pub struct Report {
    /// Identifier
    pub id: ReportId,
    /// Name of the scanned root
    pub root_name: String,
    /// When the scan started
    pub date: SystemTime,
    /// Wall-clock duration of the scan, pause included
    pub duration: Duration,
    /// Scan result
    pub sizes: Sizes,
}

/// Listing entry for a report.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReportSummary {
    /// Identifier
    pub id: ReportId,
    /// Name of the scanned root
    pub root_name: String,
    /// When the scan started
    pub date: SystemTime,
    /// Wall-clock duration of the scan
    pub duration: Duration,
    /// Grand total in bytes
    pub total: usize,
    /// Number of distinct types
    pub types: usize,
}

impl From<&Report> for ReportSummary {
    fn from(report: &Report) -> Self {
        Self {
            id: report.id,
            root_name: report.root_name.clone(),
            date: report.date,
            duration: report.duration,
            total: report.sizes.total,
            types: report.sizes.by_type.len(),
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    reports: BTreeMap<ReportId, Arc<Report>>,
    next_id: ReportId,
}

/// Serializes scan requests and keeps their reports.
///
/// `scanning` is held for the whole scan so requests queue instead of
/// pausing the world twice at once. `state` is only held to allocate an id
/// or read the reports, never across a scan: a paused mutator may be
/// blocked on it.
#[derive(Debug)]
pub struct ReportStore {
    roots: Arc<RootSet>,
    scanner: Scanner,
    scanning: Mutex<()>,
    state: Mutex<StoreState>,
}

impl ReportStore {
    /// Create a store scanning roots from `roots` with `scanner`.
    pub fn new(roots: Arc<RootSet>, scanner: Scanner) -> Self {
        Self {
            roots,
            scanner,
            scanning: Mutex::new(()),
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Registry the store scans from.
    pub fn roots(&self) -> &RootSet {
        &self.roots
    }

    /// Scan the named root and store the result.
    pub fn trigger_scan(&self, root_name: &str) -> Result<ReportId, MemsizeError> {
        let root = self.roots.resolve(root_name)?;
        let _scanning = self.scanning.lock();

        let date = SystemTime::now();
        let started = Instant::now();
        let sizes = self.scanner.scan(&*root, &[root_name]);
        let duration = started.elapsed();

        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let report = Report {
            id,
            root_name: root_name.to_string(),
            date,
            duration,
            sizes,
        };
        info!(
            id,
            root = root_name,
            total = report.sizes.total,
            duration = ?report.duration,
            "report stored"
        );
        state.reports.insert(id, Arc::new(report));
        Ok(id)
    }

    /// Report by id; `None` for ids never issued.
    pub fn get_report(&self, id: ReportId) -> Option<Arc<Report>> {
        self.state.lock().reports.get(&id).cloned()
    }

    /// Summaries of all reports, newest first.
    pub fn list_reports(&self) -> Vec<ReportSummary> {
        self.state
            .lock()
            .reports
            .values()
            .rev()
            .map(|report| ReportSummary::from(report.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ReportStore {
        let roots = Arc::new(RootSet::new());
        roots.add("words", Arc::new(vec!["a".to_string(), "bb".to_string()]));
        roots.add("flag", Arc::new(true));
        ReportStore::new(roots, Scanner::default())
    }

    #[test]
    fn test_ids_start_at_zero_and_increase() {
        let store = store();
        assert_eq!(store.trigger_scan("words").expect("scan"), 0);
        assert_eq!(store.trigger_scan("flag").expect("scan"), 1);
        assert_eq!(store.trigger_scan("words").expect("scan"), 2);
    }

    #[test]
    fn test_list_newest_first() {
        let store = store();
        store.trigger_scan("words").expect("scan");
        store.trigger_scan("flag").expect("scan");
        let listed: Vec<_> = store
            .list_reports()
            .into_iter()
            .map(|summary| (summary.id, summary.root_name))
            .collect();
        assert_eq!(listed, [(1, "flag".to_string()), (0, "words".to_string())]);
    }

    #[test]
    fn test_unknown_report_is_none() {
        let store = store();
        store.trigger_scan("flag").expect("scan");
        assert!(store.get_report(0).is_some());
        assert!(store.get_report(1).is_none());
        assert!(store.get_report(42).is_none());
    }

    #[test]
    fn test_unknown_root_consumes_no_id() {
        let store = store();
        assert!(matches!(
            store.trigger_scan("nope"),
            Err(MemsizeError::UnknownRoot(_))
        ));
        assert_eq!(store.trigger_scan("flag").expect("scan"), 0);
    }

    #[test]
    fn test_report_holds_sizes() {
        let store = store();
        let id = store.trigger_scan("flag").expect("scan");
        let report = store.get_report(id).expect("stored");
        assert_eq!(report.root_name, "flag");
        assert_eq!(report.sizes.total, 1);
    }
}
