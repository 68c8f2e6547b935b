//! Graph walker
//!
//! Recursive traversal from a root value. Every value's own bytes are
//! checked against the [`AddressSet`] before being charged, so shared
//! substructures are counted once and cycles terminate.
//!
//! ## Accounting
//!
//! For a value of static size `s` at address `a`:
//! 1. bytes of `a..a+s` already marked are not charged again; a fully marked
//!    value contributes nothing and is not traversed
//! 2. if the type needs a scan, its kind handler reports the indirect
//!    ("extra") bytes it owns; inline members that were fully marked before
//!    `a..a+s` was are skipped, since their contents were walked then
//! 3. the contribution `s - marked + extra` is attributed to the value's
//!    exact type when requested, and returned to the caller either way

mod kinds;

use bitvec::vec::BitVec;
use tracing::trace;

use crate::bitmap::AddressSet;
use crate::classify::Classifier;
use crate::reflect::{Address, Reflect, Typed};
use crate::sizes::{SizeAggregator, Sizes};

/// Marks over a partially counted range, taken just before it was marked.
#[derive(Debug)]
struct Premarked {
    start: usize,
    bits: BitVec,
}

/// Per-scan traversal state. Never reused across scans.
#[derive(Debug)]
pub struct Walker<'p> {
    seen: AddressSet,
    classifier: Classifier,
    sizes: SizeAggregator,
    /// Innermost last
    premarked: Vec<Premarked>,
    /// Root label followed by the field names leading to the current value
    path: Vec<&'p str>,
}

impl<'p> Walker<'p> {
    /// Fresh walker labelled with the root's symbolic path.
    pub fn new(chunk_bits: u32, label: &[&'p str]) -> Self {
        Self {
            seen: AddressSet::with_chunk_bits(chunk_bits),
            classifier: Classifier::new(),
            sizes: SizeAggregator::new(),
            premarked: Vec::new(),
            path: label.to_vec(),
        }
    }

    /// Size of the previously unaccounted memory under `value`.
    ///
    /// When `attribute` is set the size is also recorded under the value's
    /// exact type.
    pub fn scan(&mut self, addr: Address, value: &dyn Reflect, attribute: bool) -> usize {
        let info = value.type_info();
        let needs_scan = self.classifier.needs_scan(info);
        let depth = self.premarked.len();
        let mut size = info.size();
        let mut marked = 0;
        if addr.is_valid() {
            marked = self.seen.count_range(addr, size);
            if marked == size {
                return 0;
            }
            if marked > 0 && needs_scan {
                self.remember_marks(addr, size);
            }
            self.seen.mark_range(addr, size);
        }

        let extra = if needs_scan {
            self.scan_content(addr, value)
        } else {
            0
        };
        self.premarked.truncate(depth);
        size = size - marked + extra;

        trace!(
            path = %self.path.join("."),
            ty = info.name(),
            %addr,
            size,
            marked,
            extra,
            "scanned value"
        );
        if attribute {
            self.sizes.add(info, size);
        }
        size
    }

    /// Snapshot the marks over `addr..addr + len` before marking it.
    fn remember_marks(&mut self, addr: Address, len: usize) {
        self.premarked.push(Premarked {
            start: addr.get(),
            bits: self.seen.snapshot(addr, len),
        });
    }

    /// Whether `addr..addr + len` lies inside a remembered range and was
    /// fully marked when that range was remembered.
    fn counted_before(&self, addr: Address, len: usize) -> bool {
        if len == 0 || !addr.is_valid() {
            return false;
        }
        self.premarked
            .iter()
            .rev()
            .find_map(|range| {
                let offset = addr.get().checked_sub(range.start)?;
                let bits = range.bits.get(offset..offset.checked_add(len)?)?;
                Some(bits.all())
            })
            .unwrap_or(false)
    }

    /// Consume the walker, returning the totals and bitmap diagnostics.
    pub fn finish(self) -> Sizes {
        Sizes {
            bitmap_size: self.seen.size(),
            bitmap_utilization: self.seen.utilization(),
            ..self.sizes.report()
        }
    }
}
