// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Binary data store
//!
//! Append-only, block-chunked byte arena for payloads too large or
//! unsuitable to inline as replay source text. Call records hold plain
//! integer offsets into the arena; the arena exclusively owns all appended
//! bytes.

/// Fixed alignment of every appended item. Offsets are always multiples of
/// this so 32- and 64-bit consuming ABIs agree on layout.
pub const BINARY_ALIGNMENT: usize = 16;

/// Target size of one backing block. Appends never straddle a block
/// boundary; an item larger than this gets a dedicated block.
const BLOCK_SIZE: usize = 4 * 1024 * 1024;

struct Block {
    /// Arena-wide offset of this block's first byte.
    start: u64,
    data: Vec<u8>,
}

/// Append-only aligned byte arena.
pub struct BinaryDataStore {
    blocks: Vec<Block>,
    total_size: u64,
}

impl BinaryDataStore {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            total_size: 0,
        }
    }

    /// Append `data`, returning its stable arena offset. The item is padded
    /// with zero bytes to the next alignment boundary.
    pub fn append(&mut self, data: &[u8]) -> u64 {
        let offset = self.total_size;
        let padded = align_up(data.len(), BINARY_ALIGNMENT);

        let need_new_block = match self.blocks.last() {
            Some(block) => block.data.len() + padded > BLOCK_SIZE.max(padded),
            None => true,
        };
        if need_new_block {
            self.blocks.push(Block {
                start: offset,
                data: Vec::with_capacity(BLOCK_SIZE.max(padded)),
            });
        }

        let block = self.blocks.last_mut().expect("block pushed above");
        block.data.extend_from_slice(data);
        block.data.resize(block.data.len() + (padded - data.len()), 0);
        self.total_size += padded as u64;

        debug_assert_eq!(self.total_size % BINARY_ALIGNMENT as u64, 0);
        offset
    }

    /// Total arena size including padding; always a multiple of
    /// [`BINARY_ALIGNMENT`].
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    /// Read back `len` bytes at `offset`.
    ///
    /// Items never straddle block boundaries, so any (offset, len) pair
    /// returned by [`append`](Self::append) resolves to one contiguous
    /// slice. Reads outside any appended item are a capture engine defect.
    pub fn get(&self, offset: u64, len: u64) -> &[u8] {
        let idx = self
            .blocks
            .partition_point(|b| b.start <= offset)
            .checked_sub(1)
            .unwrap_or_else(|| panic!("binary data offset {offset} before first block"));
        let block = &self.blocks[idx];
        let local = (offset - block.start) as usize;
        let end = local + len as usize;
        assert!(
            end <= block.data.len(),
            "binary data read [{offset}, +{len}) escapes its block"
        );
        &block.data[local..end]
    }

    /// Visit every block in append order (the flush path).
    pub fn for_each_block<F: FnMut(&[u8])>(&self, mut f: F) {
        for block in &self.blocks {
            f(&block.data);
        }
    }

    /// Concatenate the arena into one contiguous blob.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_size as usize);
        self.for_each_block(|b| out.extend_from_slice(b));
        out
    }
}

impl Default for BinaryDataStore {
    fn default() -> Self {
        Self::new()
    }
}

fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_returns_aligned_offsets() {
        let mut store = BinaryDataStore::new();
        let a = store.append(&[1, 2, 3]);
        let b = store.append(&[4; 20]);
        let c = store.append(&[5]);
        assert_eq!(a % BINARY_ALIGNMENT as u64, 0);
        assert_eq!(b % BINARY_ALIGNMENT as u64, 0);
        assert_eq!(c % BINARY_ALIGNMENT as u64, 0);
        assert_eq!(store.total_size() % BINARY_ALIGNMENT as u64, 0);
    }

    #[test]
    fn test_round_trip_with_zero_padding() {
        let mut store = BinaryDataStore::new();
        let payload: Vec<u8> = (0..23u8).collect();
        let offset = store.append(&payload);

        assert_eq!(store.get(offset, payload.len() as u64), &payload[..]);

        // Padding bytes beyond the payload must be zero.
        let padded = align_up(payload.len(), BINARY_ALIGNMENT) as u64;
        let with_padding = store.get(offset, padded);
        assert!(with_padding[payload.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_large_item_gets_own_block() {
        let mut store = BinaryDataStore::new();
        store.append(&[7; 100]);
        let big = vec![9u8; BLOCK_SIZE + 1];
        let offset = store.append(&big);
        assert_eq!(store.get(offset, big.len() as u64), &big[..]);

        // Earlier items are still addressable.
        assert_eq!(store.get(0, 100), &[7; 100][..]);
    }

    #[test]
    fn test_flush_order_matches_offsets() {
        let mut store = BinaryDataStore::new();
        let a = store.append(&[0xAA; 5]);
        let b = store.append(&[0xBB; 5]);
        let blob = store.to_vec();
        assert_eq!(blob.len() as u64, store.total_size());
        assert_eq!(blob[a as usize], 0xAA);
        assert_eq!(blob[b as usize], 0xBB);
    }
}
