/*!
 * Memory Allocator Implementation
 * Allocation path: free-block lookup, page growth and block splitting
 */

use super::page::{max_allocatable, BlockMeta, BlockTag, DataPage};
use super::MemoryManager;
use crate::core::limits::{BLOCK_HEADER_SIZE, FIRST_BLOCK_OFFSET};
use crate::core::types::{Address, BlockId, FamilyId, PageId, Size};
use crate::memory::traits::PageSource;
use crate::memory::types::{MemoryError, MemoryResult};
use std::ptr::NonNull;
use tracing::{debug, info, instrument, warn};

impl<S: PageSource> MemoryManager<S> {
    /// Allocate `units` zeroed elements of the named family
    #[instrument(level = "debug", skip(self), err)]
    pub fn allocate(&mut self, name: &str, units: u32) -> MemoryResult<NonNull<u8>> {
        let family = self.registry.lookup(name).ok_or_else(|| {
            warn!(family = name, "Structure is not registered with memory manager");
            MemoryError::FamilyNotFound(name.to_string())
        })?;
        self.allocate_in(family, units)
    }

    /// Allocate `units` zeroed elements of a family by handle
    pub fn allocate_in(&mut self, family_id: FamilyId, units: u32) -> MemoryResult<NonNull<u8>> {
        let element_size = self.family(family_id)?.element_size as Size;
        if units == 0 {
            return Err(MemoryError::ZeroUnits);
        }

        let requested = (units as Size).saturating_mul(element_size);
        let max = self.max_allocatable();
        if requested > max {
            warn!(
                family = %family_id,
                requested,
                max,
                "Memory requested exceeds page size"
            );
            return Err(MemoryError::RequestTooLarge { requested, max });
        }

        let block_id = self.find_free_block(family_id, requested)?;
        self.split_free_block(family_id, block_id, requested)?;

        let (page_id, payload_offset, size) = {
            let block = self.block(block_id)?;
            (block.page, block.payload_offset(), block.size)
        };
        let page = self.page(page_id)?;
        page.zero(payload_offset, size);
        let payload = page.ptr_at(payload_offset);

        self.live.insert(payload.as_ptr() as Address, block_id);
        debug!(
            family = %family_id,
            units,
            size,
            address = payload.as_ptr() as Address,
            page = %page_id,
            "Allocated block"
        );
        Ok(payload)
    }

    /// Largest free block of the family if it fits, else the first block of a new page
    fn find_free_block(&mut self, family_id: FamilyId, requested: Size) -> MemoryResult<BlockId> {
        if let Some((block, size)) = self.family(family_id)?.free_blocks.largest() {
            if size >= requested {
                return Ok(block);
            }
        }

        let page_id = self.add_data_page(family_id)?;
        Ok(self.page(page_id)?.first_block)
    }

    /// Map a new data page holding one free block over its whole payload area
    ///
    /// The page is prepended to the family's page list. Its block is not
    /// indexed: the caller splits it immediately.
    fn add_data_page(&mut self, family_id: FamilyId) -> MemoryResult<PageId> {
        let units = self.config.page_units;
        if let Some(limit) = self.config.max_data_pages {
            if self.pages.len() >= limit {
                warn!(limit, "Data page budget exhausted");
                return Err(MemoryError::OutOfMemory {
                    units,
                    reason: format!("data page budget of {} exhausted", limit),
                });
            }
        }

        let region = self.source.acquire(units)?;
        self.counters.acquired += 1;

        let address = region.address();
        let capacity = max_allocatable(region.len());
        let old_head = self.family(family_id)?.first_page;

        let blocks = &mut self.blocks;
        let page_slot = self.pages.insert_with(|slot| {
            let page_id = PageId(slot);
            let first_block = BlockId(blocks.insert(BlockMeta {
                is_free: true,
                size: capacity,
                offset: FIRST_BLOCK_OFFSET,
                page: page_id,
                prev: None,
                next: None,
                index_key: None,
            }));
            DataPage {
                region,
                family: family_id,
                prev: None,
                next: old_head,
                first_block,
            }
        });
        let page_id = PageId(page_slot);

        if let Some(old_head) = old_head {
            self.page_mut(old_head)?.prev = Some(page_id);
        }
        let family = self.family_mut(family_id)?;
        family.first_page = Some(page_id);
        family.page_count += 1;
        let pages_in_family = family.page_count;

        self.page_index.insert(address, page_id);

        let page = self.page(page_id)?;
        page.write_tag(FIRST_BLOCK_OFFSET, BlockTag::new(page.first_block, capacity));

        info!(
            family = %family_id,
            page = %page_id,
            address,
            capacity,
            pages_in_family,
            "Added data page"
        );
        Ok(page_id)
    }

    /// Mark `block_id` allocated for `size` bytes, carving off the remainder
    ///
    /// - No split: the block fits exactly.
    /// - Hard fragmentation: remainder smaller than a header is absorbed.
    /// - Soft fragmentation / full split: the remainder becomes a new free
    ///   block chained right after the allocated one and indexed.
    fn split_free_block(
        &mut self,
        family_id: FamilyId,
        block_id: BlockId,
        size: Size,
    ) -> MemoryResult<()> {
        let element_size = self.family(family_id)?.element_size as Size;

        let block = self.block(block_id)?;
        if !block.is_free {
            return Err(MemoryError::CorruptState(format!(
                "{} chosen for allocation is not free",
                block_id
            )));
        }
        if block.size < size {
            return Err(MemoryError::CorruptState(format!(
                "{} holds {} bytes, {} requested",
                block_id, block.size, size
            )));
        }

        let remaining = block.size - size;
        let index_key = block.index_key;
        if let Some(key) = index_key {
            self.family_mut(family_id)?.free_blocks.remove(key);
        }

        let block = self.block_mut(block_id)?;
        block.index_key = None;
        block.is_free = false;
        block.size = size;
        let (page_id, offset, next) = (block.page, block.offset, block.next);

        if remaining == 0 {
            debug!(block = %block_id, size, "Exact fit, no split");
        } else if remaining < BLOCK_HEADER_SIZE {
            self.block_mut(block_id)?.size += remaining;
            debug!(
                block = %block_id,
                size,
                wasted = remaining,
                "Hard internal fragmentation, remainder absorbed"
            );
        } else {
            let free_offset = offset + BLOCK_HEADER_SIZE + size;
            let free_size = remaining - BLOCK_HEADER_SIZE;
            let free_id = BlockId(self.blocks.insert(BlockMeta {
                is_free: true,
                size: free_size,
                offset: free_offset,
                page: page_id,
                prev: Some(block_id),
                next,
                index_key: None,
            }));

            self.block_mut(block_id)?.next = Some(free_id);
            if let Some(next) = next {
                self.block_mut(next)?.prev = Some(free_id);
            }

            let key = self
                .family_mut(family_id)?
                .free_blocks
                .insert(free_id, free_size);
            self.block_mut(free_id)?.index_key = Some(key);
            self.page(page_id)?
                .write_tag(free_offset, BlockTag::new(free_id, free_size));

            if free_size < element_size {
                debug!(
                    block = %block_id,
                    size,
                    remainder = free_size,
                    "Soft internal fragmentation, remainder below one element"
                );
            } else {
                debug!(block = %block_id, size, remainder = free_size, "Full split");
            }
        }

        let final_size = self.block(block_id)?.size;
        self.page(page_id)?
            .write_tag(offset, BlockTag::new(block_id, final_size));
        Ok(())
    }
}
