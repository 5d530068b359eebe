/*!
 * Free-Block Index
 * Per-family priority index of free blocks, largest first
 */

use crate::core::types::{BlockId, Size};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Position of a free block in the index
///
/// Ordered by payload size descending, then by insertion sequence, so equal
/// sizes are served first-in first-out and no block starves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct IndexKey {
    size: Reverse<Size>,
    seq: u64,
}

impl IndexKey {
    #[inline]
    pub fn size(&self) -> Size {
        self.size.0
    }
}

/// Free blocks of one family ordered by payload size
///
/// - Largest lookup: O(log n)
/// - Insert / arbitrary removal: O(log n) through the key each block keeps
#[derive(Debug, Default)]
pub(crate) struct FreeBlockIndex {
    entries: BTreeMap<IndexKey, BlockId>,
    next_seq: u64,
}

impl FreeBlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a free block; the returned key is needed to remove it again
    pub fn insert(&mut self, block: BlockId, size: Size) -> IndexKey {
        let key = IndexKey {
            size: Reverse(size),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(key, block);
        key
    }

    pub fn remove(&mut self, key: IndexKey) -> Option<BlockId> {
        self.entries.remove(&key)
    }

    /// Largest free block and its payload size
    pub fn largest(&self) -> Option<(BlockId, Size)> {
        self.entries
            .first_key_value()
            .map(|(key, block)| (*block, key.size()))
    }

    pub fn contains(&self, key: IndexKey, block: BlockId) -> bool {
        self.entries.get(&key) == Some(&block)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Free blocks in priority order (largest first)
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, Size)> + '_ {
        self.entries.iter().map(|(key, block)| (*block, key.size()))
    }

    pub fn total_bytes(&self) -> Size {
        self.entries.keys().map(|key| key.size()).sum()
    }
}
