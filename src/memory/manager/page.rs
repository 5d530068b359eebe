/*!
 * Data Pages and Block Records
 * Page list links, block chain records and on-page header tags
 */

use super::free_list::IndexKey;
use crate::core::limits::{BLOCK_HEADER_SIZE, BLOCK_TAG_MAGIC, BLOCK_TAG_SIZE, PAGE_HEADER_SIZE};
use crate::core::types::{Address, BlockId, FamilyId, PageId, Size, Slot};
use crate::memory::traits::VmRegion;
use std::ptr::NonNull;

/// Bookkeeping for one contiguous byte range of a data page
#[derive(Debug, Clone)]
pub(crate) struct BlockMeta {
    pub is_free: bool,
    /// Payload bytes, excluding the header
    pub size: Size,
    /// Header offset from the start of the page; fixed once assigned
    pub offset: Size,
    pub page: PageId,
    /// Chain neighbours in memory order
    pub prev: Option<BlockId>,
    pub next: Option<BlockId>,
    /// Present exactly while the block is free
    pub index_key: Option<IndexKey>,
}

impl BlockMeta {
    /// Offset one past the last payload byte
    #[inline]
    pub fn end(&self) -> Size {
        self.offset + BLOCK_HEADER_SIZE + self.size
    }

    #[inline]
    pub fn payload_offset(&self) -> Size {
        self.offset + BLOCK_HEADER_SIZE
    }
}

/// One mapped page (or run of pages) owned by a single family
#[derive(Debug)]
pub(crate) struct DataPage {
    pub region: VmRegion,
    pub family: FamilyId,
    pub prev: Option<PageId>,
    pub next: Option<PageId>,
    /// Lowest block; survives every merge since merges fold into the earlier block
    pub first_block: BlockId,
}

/// Integrity tag stamped into the leading bytes of each block header
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockTag {
    pub magic: u32,
    pub index: u32,
    pub generation: u32,
    pub size: u32,
}

const _: () = assert!(std::mem::size_of::<BlockTag>() == BLOCK_TAG_SIZE);

impl BlockTag {
    pub fn new(block: BlockId, size: Size) -> Self {
        let slot: Slot = block.into();
        Self {
            magic: BLOCK_TAG_MAGIC,
            index: slot.index,
            generation: slot.generation,
            size: size as u32,
        }
    }
}

/// Payload bytes a fresh data page of `len` bytes offers as one free block
#[inline]
pub(crate) fn max_allocatable(len: Size) -> Size {
    len.saturating_sub(PAGE_HEADER_SIZE + BLOCK_HEADER_SIZE)
}

impl DataPage {
    #[inline]
    pub fn base(&self) -> Address {
        self.region.address()
    }

    #[inline]
    pub fn len(&self) -> Size {
        self.region.len()
    }

    /// Pointer to `offset` bytes into the page
    ///
    /// Callers pass offsets derived from block records, which never exceed
    /// the page length.
    #[inline]
    pub fn ptr_at(&self, offset: Size) -> NonNull<u8> {
        debug_assert!(offset <= self.len());
        // SAFETY: offset stays inside the mapping owned by this page.
        unsafe { NonNull::new_unchecked(self.region.base().as_ptr().add(offset)) }
    }

    pub fn write_tag(&self, offset: Size, tag: BlockTag) {
        debug_assert!(offset + BLOCK_TAG_SIZE <= self.len());
        // SAFETY: header bytes lie inside the mapping; unaligned because
        // element sizes place headers at arbitrary offsets.
        unsafe {
            std::ptr::write_unaligned(self.ptr_at(offset).as_ptr().cast::<BlockTag>(), tag);
        }
    }

    pub fn read_tag(&self, offset: Size) -> BlockTag {
        debug_assert!(offset + BLOCK_TAG_SIZE <= self.len());
        // SAFETY: see `write_tag`.
        unsafe { std::ptr::read_unaligned(self.ptr_at(offset).as_ptr().cast::<BlockTag>()) }
    }

    /// Wipe a header whose bytes were absorbed into a neighbour's payload
    pub fn clear_tag(&self, offset: Size) {
        self.zero(offset, BLOCK_TAG_SIZE);
    }

    pub fn zero(&self, offset: Size, len: Size) {
        debug_assert!(offset + len <= self.len());
        // SAFETY: range lies inside the mapping owned by this page.
        unsafe {
            std::ptr::write_bytes(self.ptr_at(offset).as_ptr(), 0, len);
        }
    }
}
