/*!
 * Memory Introspection
 * Page and block walks, usage statistics and layout validation
 */

use super::page::{BlockMeta, DataPage};
use super::MemoryManager;
use crate::core::data_structures::Arena;
use crate::core::limits::{BLOCK_HEADER_SIZE, FIRST_BLOCK_OFFSET, PAGE_HEADER_SIZE};
use crate::core::types::{Address, BlockId, FamilyId, PageId, Size};
use crate::memory::traits::PageSource;
use crate::memory::types::{BlockInfo, Fault, FamilyUsage, MemoryStats};
use std::ptr::NonNull;

/// Walk over a family's data pages, most recently added first
#[derive(Clone)]
pub struct PageIter<'a> {
    pages: &'a Arena<DataPage>,
    cursor: Option<PageId>,
}

impl Iterator for PageIter<'_> {
    type Item = PageId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        self.cursor = self.pages.get(current.into()).and_then(|page| page.next);
        Some(current)
    }
}

/// Walk over a page's block chain in memory order
#[derive(Clone)]
pub struct BlockIter<'a> {
    blocks: &'a Arena<BlockMeta>,
    cursor: Option<BlockId>,
}

impl Iterator for BlockIter<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.blocks.get(self.cursor?.into())?;
        self.cursor = block.next;
        Some(BlockInfo {
            offset: block.offset,
            size: block.size,
            is_free: block.is_free,
        })
    }
}

impl<S: PageSource> MemoryManager<S> {
    /// True iff the page holds exactly one block and that block is free
    pub fn is_page_empty(&self, page: PageId) -> bool {
        self.pages
            .get(page.into())
            .and_then(|page| self.blocks.get(page.first_block.into()))
            .map_or(false, |block| {
                block.is_free && block.prev.is_none() && block.next.is_none()
            })
    }

    /// Data pages of a family (empty for unknown families)
    pub fn pages(&self, family: FamilyId) -> PageIter<'_> {
        PageIter {
            pages: &self.pages,
            cursor: self.registry.get(family).and_then(|f| f.first_page),
        }
    }

    /// Blocks of a page in memory order (empty for unknown pages)
    pub fn blocks(&self, page: PageId) -> BlockIter<'_> {
        BlockIter {
            blocks: &self.blocks,
            cursor: self.pages.get(page.into()).map(|p| p.first_block),
        }
    }

    /// Data page containing `ptr`, if any
    pub fn owning_page(&self, ptr: NonNull<u8>) -> Option<PageId> {
        self.page_containing(ptr.as_ptr() as Address)
    }

    /// Block behind a live allocation
    pub fn allocation_info(&self, ptr: NonNull<u8>) -> Option<BlockInfo> {
        let block_id = self.live.get(&(ptr.as_ptr() as Address))?;
        let block = self.blocks.get((*block_id).into())?;
        Some(BlockInfo {
            offset: block.offset,
            size: block.size,
            is_free: block.is_free,
        })
    }

    /// Number of live allocations across all families
    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    /// Payload size of the family's largest free block
    pub fn largest_free_block(&self, family: FamilyId) -> Option<Size> {
        self.registry
            .get(family)?
            .free_blocks
            .largest()
            .map(|(_, size)| size)
    }

    pub fn family_usage(&self, family_id: FamilyId) -> Option<FamilyUsage> {
        let family = self.registry.get(family_id)?;
        let mut usage = FamilyUsage {
            name: family.name.to_string(),
            element_size: family.element_size,
            pages: family.page_count,
            largest_free_block: family.free_blocks.largest().map(|(_, size)| size),
            ..FamilyUsage::default()
        };

        for page in self.pages(family_id) {
            for block in self.blocks(page) {
                if block.is_free {
                    usage.free_blocks += 1;
                    usage.free_bytes += block.size;
                } else {
                    usage.allocated_blocks += 1;
                    usage.allocated_bytes += block.size;
                }
            }
        }
        Some(usage)
    }

    pub fn stats(&self) -> MemoryStats {
        let mut stats = MemoryStats {
            page_size: self.page_size,
            page_units: self.config.page_units,
            families: self.registry.len(),
            family_groups: self.registry.group_count(),
            data_pages: self.pages.len(),
            pages_acquired: self.counters.acquired,
            pages_released: self.counters.released,
            release_failures: self.counters.release_failures,
            ..MemoryStats::default()
        };

        for (_, block) in self.blocks.iter() {
            if block.is_free {
                stats.free_blocks += 1;
                stats.free_bytes += block.size;
            } else {
                stats.allocated_blocks += 1;
                stats.allocated_bytes += block.size;
            }
        }
        stats
    }

    /// Check every layout invariant, reporting the first violation
    ///
    /// - page lists are consistently doubly linked and owned by their family
    /// - each chain starts after the page header, is contiguous in memory
    ///   order and ends exactly at the end of the page
    /// - no two chain neighbours are both free
    /// - a block is in its family's free index iff it is free
    /// - every live allocation points at an allocated block
    pub fn validate(&self) -> Result<(), Fault> {
        let mut indexed_free = 0usize;

        for (family_id, family) in self.registry.iter() {
            let mut prev_page: Option<PageId> = None;
            let mut page_count = 0usize;
            let mut family_free = 0usize;

            for page_id in self.pages(family_id) {
                let page = self.pages.get(page_id.into()).ok_or_else(|| {
                    violation(page_id, "page list points at a released page".to_string())
                })?;
                if page.family != family_id {
                    return Err(violation(
                        page_id,
                        format!("owned by {}, listed under {}", page.family, family_id),
                    ));
                }
                if page.prev != prev_page {
                    return Err(violation(
                        page_id,
                        "broken prev link in page list".to_string(),
                    ));
                }
                family_free += self.validate_page(family_id, page_id, page)?;
                prev_page = Some(page_id);
                page_count += 1;
            }

            if page_count != family.page_count {
                let page = prev_page.unwrap_or_default();
                return Err(violation(
                    page,
                    format!(
                        "{} counts {} pages, list holds {}",
                        family_id, family.page_count, page_count
                    ),
                ));
            }
            let first_page = family.first_page.unwrap_or_default();
            if family_free != family.free_blocks.len() {
                return Err(violation(
                    first_page,
                    format!(
                        "{} free blocks on pages, {} indexed",
                        family_free,
                        family.free_blocks.len()
                    ),
                ));
            }
            let mut indexed_bytes = 0;
            for (block_id, size) in family.free_blocks.iter() {
                match self.blocks.get(block_id.into()) {
                    Some(block) if block.is_free && block.size == size => indexed_bytes += size,
                    _ => {
                        return Err(violation(
                            first_page,
                            format!("index entry {} ({} bytes) is stale", block_id, size),
                        ))
                    }
                }
            }
            if indexed_bytes != family.free_blocks.total_bytes() {
                return Err(violation(
                    first_page,
                    "free index byte total drifted".to_string(),
                ));
            }
            indexed_free += family_free;
        }

        let total_free = self.blocks.iter().filter(|(_, b)| b.is_free).count();
        if total_free != indexed_free {
            return Err(violation(
                PageId::default(),
                format!(
                    "{} free blocks exist, {} reachable from page lists",
                    total_free, indexed_free
                ),
            ));
        }

        for (&address, &block_id) in &self.live {
            match self.blocks.get(block_id.into()) {
                Some(block) if !block.is_free => {
                    let payload = self
                        .pages
                        .get(block.page.into())
                        .map(|page| page.base() + block.payload_offset());
                    if payload != Some(address) {
                        return Err(violation(
                            block.page,
                            format!("live pointer 0x{:x} does not match {}", address, block_id),
                        ));
                    }
                }
                _ => {
                    return Err(violation(
                        PageId::default(),
                        format!("live pointer 0x{:x} refers to a free or missing block", address),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Validate one page's chain; returns its number of free blocks
    fn validate_page(
        &self,
        family_id: FamilyId,
        page_id: PageId,
        page: &DataPage,
    ) -> Result<usize, Fault> {
        let family = self
            .registry
            .get(family_id)
            .ok_or_else(|| violation(page_id, format!("unknown {}", family_id)))?;

        let mut cursor = Some(page.first_block);
        let mut prev: Option<BlockId> = None;
        let mut prev_free = false;
        let mut expected_offset = FIRST_BLOCK_OFFSET;
        let mut covered = PAGE_HEADER_SIZE;
        let mut free = 0usize;

        while let Some(block_id) = cursor {
            let block = self.blocks.get(block_id.into()).ok_or_else(|| {
                violation(page_id, format!("chain points at missing {}", block_id))
            })?;

            if block.page != page_id {
                return Err(violation(
                    page_id,
                    format!("{} claims {}", block_id, block.page),
                ));
            }
            if block.prev != prev {
                return Err(violation(
                    page_id,
                    format!("broken prev link at {}", block_id),
                ));
            }
            if block.offset != expected_offset {
                return Err(violation(
                    page_id,
                    format!(
                        "{} at offset {}, expected {}",
                        block_id, block.offset, expected_offset
                    ),
                ));
            }
            if block.is_free && prev_free {
                return Err(violation(
                    page_id,
                    format!("{} and its predecessor are both free", block_id),
                ));
            }

            match (block.is_free, block.index_key) {
                (true, Some(key)) if family.free_blocks.contains(key, block_id) => free += 1,
                (false, None) => {}
                _ => {
                    return Err(violation(
                        page_id,
                        format!("{} free flag disagrees with free index", block_id),
                    ));
                }
            }

            covered += BLOCK_HEADER_SIZE + block.size;
            expected_offset = block.end();
            prev_free = block.is_free;
            prev = Some(block_id);
            cursor = block.next;
        }

        if covered != page.len() {
            return Err(violation(
                page_id,
                format!("blocks cover {} of {} bytes", covered, page.len()),
            ));
        }
        Ok(free)
    }
}

fn violation(page: PageId, detail: String) -> Fault {
    Fault::LayoutViolation { page, detail }
}
