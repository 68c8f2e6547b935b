//! Kind handlers
//!
//! Each handler returns only the indirect bytes a value owns; the value's
//! own static footprint is charged by [`Walker::scan`].

use tracing::trace;

use super::Walker;
use crate::reflect::{Address, Kind, MapView, Members, QueueView, Reflect, SequenceView, Typed};

impl Walker<'_> {
    /// Indirect bytes under `value`, dispatched on its structural kind.
    ///
    /// # Panics
    /// If the value's kind disagrees with its type's shape: the
    /// introspection facility is broken and any total would be wrong.
    pub(super) fn scan_content(&mut self, addr: Address, value: &dyn Reflect) -> usize {
        let kind = value.kind();
        let info = value.type_info();
        let shape = self.classifier.shape(info);
        assert!(
            kind.fits(shape),
            "`{}` reported a {:?} value but its shape is {:?}",
            info.name(),
            kind,
            shape
        );

        match kind {
            Kind::Scalar | Kind::Callable => 0,
            Kind::Text(bytes) => bytes,
            Kind::Aggregate(members) | Kind::Array(members) => self.scan_members(addr, members),
            Kind::Sequence(seq) => self.scan_sequence(seq),
            Kind::Map(map) => self.scan_map(map),
            Kind::Queue(queue) => self.scan_queue(queue),
            Kind::Pointer(target) => {
                if let Some(target) = target {
                    self.scan_pointer(target);
                }
                0
            }
            Kind::Dynamic(payload) => payload.map_or(0, |payload| self.scan_dynamic(payload)),
        }
    }

    /// Inline members at their own offsets inside the value at `base`.
    fn scan_members(&mut self, base: Address, members: &dyn Members) -> usize {
        let mut extra = 0;
        members.for_each_member(&mut |member| {
            let info = member.value.type_info();
            if !self.classifier.needs_scan(info) {
                return;
            }
            let at = base.member(member.value);
            if self.counted_before(at, info.size()) {
                return;
            }
            if let Some(name) = member.name {
                self.path.push(name);
            }
            extra += self.scan_content(at, member.value);
            if member.name.is_some() {
                self.path.pop();
            }
        });
        extra
    }

    /// Contents of elements stored inline in an already charged buffer.
    fn scan_elements(&mut self, elems: &dyn Members, elem_size: usize) -> usize {
        let mut extra = 0;
        elems.for_each_member(&mut |elem| {
            let at = Address::of(elem.value);
            if !self.counted_before(at, elem_size) {
                extra += self.scan_content(at, elem.value);
            }
        });
        extra
    }

    /// The whole buffer, up to capacity, is charged once; element contents
    /// are walked only within the logical length.
    ///
    /// Elements (or parts of them) already covered by another view, or by a
    /// pointer into the buffer, were walked then and are skipped.
    fn scan_sequence(&mut self, seq: SequenceView<'_>) -> usize {
        let elem_size = seq.elem.size();
        let buffer = seq.capacity.saturating_mul(elem_size);
        let marked = self.seen.count_range(seq.base, buffer);
        if buffer > 0 && marked == buffer {
            return 0;
        }

        let walk_elems = self.classifier.needs_scan(seq.elem);
        let depth = self.premarked.len();
        if walk_elems && marked > 0 {
            self.remember_marks(seq.base, buffer);
        }
        // Marked ahead of the element walk so views reached from inside the
        // buffer terminate.
        self.seen.mark_range(seq.base, buffer);

        let mut extra = buffer - marked;
        if walk_elems {
            extra += self.scan_elements(seq.elems, elem_size);
        }
        self.premarked.truncate(depth);
        trace!(
            elem = seq.elem.name(),
            len = seq.len,
            capacity = seq.capacity,
            extra,
            "scanned sequence"
        );
        extra
    }

    fn scan_map(&mut self, map: MapView<'_>) -> usize {
        if !self.classifier.needs_scan(map.key) && !self.classifier.needs_scan(map.value) {
            return map.len * (map.key.size() + map.value.size());
        }
        let mut extra = 0;
        map.entries.for_each_entry(&mut |key, value| {
            extra += self.scan(Address::INVALID, key, false);
            extra += self.scan(Address::INVALID, value, false);
        });
        extra
    }

    /// Occupied slots are deduplicated like a sequence buffer. Unoccupied
    /// slots are uninitialised: no other path can reach them, so they are
    /// charged as raw bytes and never marked or read.
    fn scan_queue(&mut self, queue: QueueView<'_>) -> usize {
        let elem_size = queue.elem.size();
        let walk_slots = self.classifier.needs_scan(queue.elem);
        let depth = self.premarked.len();

        let mut extra = queue.capacity.saturating_sub(queue.len()) * elem_size;
        for (start, count) in queue.runs {
            let bytes = count * elem_size;
            let marked = self.seen.count_range(start, bytes);
            if walk_slots && marked > 0 {
                self.remember_marks(start, bytes);
            }
            self.seen.mark_range(start, bytes);
            extra += bytes - marked;
        }

        if walk_slots {
            extra += self.scan_elements(queue.slots, elem_size);
        }
        self.premarked.truncate(depth);
        extra
    }

    /// The pointee is charged to its own type; the pointer adds no extra.
    fn scan_pointer(&mut self, target: &dyn Reflect) {
        trace!(
            path = %self.path.join("."),
            target = target.type_info().name(),
            "following pointer"
        );
        self.scan(Address::of(target), target, true);
    }

    /// The payload is folded into the wrapper rather than charged to itself.
    fn scan_dynamic(&mut self, payload: &dyn Reflect) -> usize {
        self.scan(Address::of(payload), payload, false)
    }
}
