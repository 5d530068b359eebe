/*!
 * Block Release and Coalescing
 * Release path: neighbour merging and empty page reclamation
 */

use super::page::BlockTag;
use super::MemoryManager;
use crate::core::limits::{BLOCK_HEADER_SIZE, BLOCK_TAG_MAGIC};
use crate::core::types::{Address, BlockId, FamilyId, PageId};
use crate::memory::traits::PageSource;
use crate::memory::types::{Fault, MemoryError, MemoryResult};
use std::ptr::NonNull;
use tracing::{debug, error, info, instrument, warn};

impl<S: PageSource> MemoryManager<S> {
    /// Release a payload pointer returned by `allocate`
    ///
    /// # Panics
    ///
    /// Releasing a pointer into a managed page that is not a live allocation
    /// halts with a `DoubleFree` fault; a clobbered block header halts with
    /// `HeaderCorrupted`.
    ///
    /// Once a page has been returned to the OS, a stale pointer into it is
    /// indistinguishable from a foreign pointer and yields `InvalidAddress`.
    #[instrument(level = "debug", skip(self, ptr), fields(address = ptr.as_ptr() as usize), err)]
    pub fn release(&mut self, ptr: NonNull<u8>) -> MemoryResult<()> {
        let address = ptr.as_ptr() as Address;
        let block_id = match self.live.remove(&address) {
            Some(block_id) => block_id,
            None => {
                if let Some(page) = self.page_containing(address) {
                    Fault::DoubleFree { address, page }.raise();
                }
                warn!(address, "Attempted to release pointer not owned by memory manager");
                return Err(MemoryError::InvalidAddress(address));
            }
        };

        let (page_id, size) = {
            let block = self.block(block_id)?;
            (block.page, block.size)
        };
        self.verify_tag(block_id)?;
        let family_id = self.page(page_id)?.family;

        self.block_mut(block_id)?.is_free = true;

        let mut merged = block_id;
        if let Some(prev) = self.block(merged)?.prev {
            if self.block(prev)?.is_free {
                self.unindex(family_id, prev)?;
                self.merge_free_blocks(prev, merged)?;
                merged = prev;
            }
        }
        if let Some(next) = self.block(merged)?.next {
            if self.block(next)?.is_free {
                self.unindex(family_id, next)?;
                self.merge_free_blocks(merged, next)?;
            }
        }

        debug!(
            address,
            size,
            block = %merged,
            merged_size = self.block(merged)?.size,
            "Released block"
        );

        if self.is_page_empty(page_id) {
            self.delete_data_page(page_id)?;
        } else {
            let merged_size = self.block(merged)?.size;
            let key = self
                .family_mut(family_id)?
                .free_blocks
                .insert(merged, merged_size);
            self.block_mut(merged)?.index_key = Some(key);
        }
        Ok(())
    }

    /// Fold `second` (the chain successor of `first`) into `first`
    ///
    /// Both blocks must be free; `second`'s header becomes payload.
    fn merge_free_blocks(&mut self, first: BlockId, second: BlockId) -> MemoryResult<()> {
        let (second_free, second_size, second_offset, second_next) = {
            let block = self.block(second)?;
            (block.is_free, block.size, block.offset, block.next)
        };
        if !self.block(first)?.is_free || !second_free {
            Fault::MergeNonFree { first, second }.raise();
        }

        let first_block = self.block_mut(first)?;
        first_block.size += BLOCK_HEADER_SIZE + second_size;
        first_block.next = second_next;
        let (page_id, first_offset, merged_size) =
            (first_block.page, first_block.offset, first_block.size);

        if let Some(next) = second_next {
            self.block_mut(next)?.prev = Some(first);
        }
        self.blocks.remove(second.into());

        let page = self.page(page_id)?;
        page.clear_tag(second_offset);
        page.write_tag(first_offset, BlockTag::new(first, merged_size));
        Ok(())
    }

    /// Drop a free block from its family's index
    fn unindex(&mut self, family_id: FamilyId, block_id: BlockId) -> MemoryResult<()> {
        if let Some(key) = self.block_mut(block_id)?.index_key.take() {
            self.family_mut(family_id)?.free_blocks.remove(key);
        }
        Ok(())
    }

    /// Check the on-page header of an allocated block before freeing it
    fn verify_tag(&self, block_id: BlockId) -> MemoryResult<()> {
        let block = self.block(block_id)?;
        let tag = self.page(block.page)?.read_tag(block.offset);
        let expected = BlockTag::new(block_id, block.size);

        if tag != expected {
            let detail = if tag.magic != BLOCK_TAG_MAGIC {
                format!("magic 0x{:08x}", tag.magic)
            } else {
                format!("found {:?}, expected {:?}", tag, expected)
            };
            Fault::HeaderCorrupted {
                block: block_id,
                offset: block.offset,
                detail,
            }
            .raise();
        }
        Ok(())
    }

    /// Unlink an empty page from its family and return it to the page source
    fn delete_data_page(&mut self, page_id: PageId) -> MemoryResult<()> {
        let (family_id, prev, next, first_block) = {
            let page = self.page(page_id)?;
            (page.family, page.prev, page.next, page.first_block)
        };

        match prev {
            Some(prev) => self.page_mut(prev)?.next = next,
            None => self.family_mut(family_id)?.first_page = next,
        }
        if let Some(next) = next {
            self.page_mut(next)?.prev = prev;
        }
        self.family_mut(family_id)?.page_count -= 1;

        self.unindex(family_id, first_block)?;
        self.blocks.remove(first_block.into());

        let page = self
            .pages
            .remove(page_id.into())
            .ok_or_else(|| MemoryError::CorruptState(format!("dangling {}", page_id)))?;
        let address = page.region.address();
        self.page_index.remove(&address);

        match self.source.release(page.region) {
            Ok(()) => {
                self.counters.released += 1;
                info!(family = %family_id, page = %page_id, address, "Returned empty data page");
            }
            Err(e) => {
                self.counters.release_failures += 1;
                error!(page = %page_id, address, error = %e, "Could not return empty data page");
            }
        }
        Ok(())
    }
}
