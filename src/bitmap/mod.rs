//! Sparse visited-address bitmap
//!
//! One bit per byte of address space, allocated lazily in fixed-size chunks
//! so arbitrarily scattered addresses cost memory proportional to the
//! chunks they touch, not to the span between them.

use std::collections::HashMap;
use std::ops::Range;

use bitvec::prelude::*;

use crate::reflect::Address;

/// Default chunk width: each chunk covers 64 KiB of address space.
pub const DEFAULT_CHUNK_BITS: u32 = 16;

/// Smallest accepted chunk width (one machine word of bits).
pub const MIN_CHUNK_BITS: u32 = 6;

/// Largest accepted chunk width.
pub const MAX_CHUNK_BITS: u32 = 30;

/// Records which byte ranges have already been counted.
#[derive(Debug)]
pub struct AddressSet {
    /// Chunk index -> one bit per byte of that chunk
    chunks: HashMap<usize, BitBox>,
    chunk_bits: u32,
    /// Bits set across all chunks
    marked: usize,
}

impl Default for AddressSet {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSet {
    /// Create an empty set with the default chunk width.
    pub fn new() -> Self {
        Self::with_chunk_bits(DEFAULT_CHUNK_BITS)
    }

    /// Create an empty set whose chunks cover `2^chunk_bits` bytes.
    ///
    /// `chunk_bits` is clamped to `MIN_CHUNK_BITS..=MAX_CHUNK_BITS`.
    pub fn with_chunk_bits(chunk_bits: u32) -> Self {
        Self {
            chunks: HashMap::new(),
            chunk_bits: chunk_bits.clamp(MIN_CHUNK_BITS, MAX_CHUNK_BITS),
            marked: 0,
        }
    }

    fn chunk_len(&self) -> usize {
        1 << self.chunk_bits
    }

    /// Mark `len` bytes starting at `addr` as visited.
    pub fn mark_range(&mut self, addr: Address, len: usize) {
        let chunk_len = self.chunk_len();
        for (index, span) in chunk_spans(self.chunk_bits, addr, len) {
            let chunk = self
                .chunks
                .entry(index)
                .or_insert_with(|| BitVec::repeat(false, chunk_len).into_boxed_bitslice());
            let bits = &mut chunk[span];
            self.marked += bits.count_zeros();
            bits.fill(true);
        }
    }

    /// Number of bytes in `addr..addr + len` that are already marked.
    pub fn count_range(&self, addr: Address, len: usize) -> usize {
        chunk_spans(self.chunk_bits, addr, len)
            .map(|(index, span)| {
                self.chunks
                    .get(&index)
                    .map_or(0, |chunk| chunk[span].count_ones())
            })
            .sum()
    }

    /// Copy of the marks over `addr..addr + len`, one bit per byte.
    pub fn snapshot(&self, addr: Address, len: usize) -> BitVec {
        let mut bits = BitVec::with_capacity(len);
        for (index, span) in chunk_spans(self.chunk_bits, addr, len) {
            match self.chunks.get(&index) {
                Some(chunk) => bits.extend_from_bitslice(&chunk[span]),
                None => bits.resize(bits.len() + span.len(), false),
            }
        }
        bits
    }

    /// Bytes of bitmap memory allocated so far.
    pub fn size(&self) -> usize {
        self.chunks.len() * (self.chunk_len() / 8)
    }

    /// Fraction of allocated bits that are set.
    pub fn utilization(&self) -> f32 {
        if self.chunks.is_empty() {
            return 0.0;
        }
        self.marked as f32 / (self.chunks.len() * self.chunk_len()) as f32
    }
}

/// Split `addr..addr + len` into `(chunk index, bit range)` pieces.
///
/// The invalid address and empty ranges yield nothing; ranges running past
/// the end of the address space are clamped.
fn chunk_spans(
    chunk_bits: u32,
    addr: Address,
    len: usize,
) -> impl Iterator<Item = (usize, Range<usize>)> {
    let chunk_len = 1usize << chunk_bits;
    let mut cursor = addr.get();
    let end = if addr.is_valid() {
        cursor.saturating_add(len)
    } else {
        cursor
    };
    std::iter::from_fn(move || {
        if cursor >= end {
            return None;
        }
        let index = cursor >> chunk_bits;
        let offset = cursor & (chunk_len - 1);
        let take = (end - cursor).min(chunk_len - offset);
        cursor += take;
        Some((index, offset..offset + take))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(raw: usize) -> Address {
        Address::from_ptr(raw as *const u8)
    }

    #[test]
    fn test_mark_then_count() {
        let mut set = AddressSet::new();
        set.mark_range(addr(0x1000), 16);
        assert_eq!(set.count_range(addr(0x1000), 16), 16);
        assert_eq!(set.count_range(addr(0x1008), 16), 8);
        assert_eq!(set.count_range(addr(0x2000), 16), 0);
    }

    #[test]
    fn test_count_does_not_allocate() {
        let set = AddressSet::new();
        assert_eq!(set.count_range(addr(0xdead_0000), 4096), 0);
        assert_eq!(set.size(), 0);
        assert_eq!(set.utilization(), 0.0);
    }

    #[test]
    fn test_range_across_chunks() {
        let mut set = AddressSet::with_chunk_bits(MIN_CHUNK_BITS);
        set.mark_range(addr(60), 10);
        assert_eq!(set.size(), 2 * 8);
        assert_eq!(set.count_range(addr(1), 127), 10);
        assert_eq!(set.utilization(), 10.0 / 128.0);
    }

    #[test]
    fn test_sparse_addresses_stay_small() {
        let mut set = AddressSet::new();
        set.mark_range(addr(0x10), 8);
        set.mark_range(addr(1 << 40), 8);
        set.mark_range(addr(usize::MAX - 64), 8);
        assert_eq!(set.size(), 3 * (1 << DEFAULT_CHUNK_BITS) / 8);
    }

    #[test]
    fn test_remarking_does_not_double_count() {
        let mut set = AddressSet::with_chunk_bits(MIN_CHUNK_BITS);
        set.mark_range(addr(8), 8);
        set.mark_range(addr(8), 8);
        set.mark_range(addr(12), 8);
        assert_eq!(set.utilization(), 12.0 / 64.0);
    }

    #[test]
    fn test_invalid_and_empty_ranges_are_noops() {
        let mut set = AddressSet::new();
        set.mark_range(Address::INVALID, 64);
        set.mark_range(addr(0x4000), 0);
        assert_eq!(set.size(), 0);
        assert_eq!(set.count_range(Address::INVALID, 64), 0);
    }

    #[test]
    fn test_snapshot_mirrors_marks() {
        let mut set = AddressSet::with_chunk_bits(MIN_CHUNK_BITS);
        set.mark_range(addr(62), 4);
        let bits = set.snapshot(addr(60), 8);
        assert_eq!(bits.len(), 8);
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), [2, 3, 4, 5]);
        assert_eq!(set.snapshot(addr(0x1000), 16).count_ones(), 0);
        assert!(set.snapshot(Address::INVALID, 16).is_empty());
    }

    #[test]
    fn test_range_clamped_at_end_of_address_space() {
        let mut set = AddressSet::with_chunk_bits(MIN_CHUNK_BITS);
        set.mark_range(addr(usize::MAX - 3), 100);
        assert_eq!(set.count_range(addr(usize::MAX - 3), 100), 3);
    }
}
