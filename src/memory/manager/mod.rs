/*!
 * Memory Management
 *
 * Type-aware slab allocator built directly on OS virtual-memory pages.
 *
 * ## Model
 *
 * - **Families**: named structure types with a fixed element size. Every
 *   request is served in units of that size.
 * - **Data pages**: whole OS pages owned by one family, subdivided into a
 *   contiguous chain of blocks (header + payload).
 * - **Free-block index**: per family, largest free block first.
 *
 * ## Allocation
 *
 * - Largest free block of the family is split for the request; a remainder
 *   too small for a header is absorbed (hard fragmentation), anything larger
 *   becomes a new free block.
 * - No free block fits: a fresh data page is mapped and prepended to the
 *   family's page list.
 *
 * ## Release
 *
 * - The freed block merges with free chain neighbours (previous, then next).
 * - A page left holding a single free block is unmapped immediately.
 *
 * Single-threaded: every operation takes `&mut self` and runs to completion.
 */

mod allocator;
mod coalesce;
mod free_list;
mod introspection;
mod page;
mod registry;

pub use introspection::{BlockIter, PageIter};

use crate::core::data_structures::Arena;
use crate::core::limits::BLOCK_HEADER_SIZE;
use crate::core::types::{Address, BlockId, FamilyId, PageId, Size};
use crate::memory::config::ManagerConfig;
use crate::memory::traits::PageSource;
use crate::memory::types::{FamilyInfo, MemoryError, MemoryResult};
use crate::memory::vm::MmapPageSource;
use ahash::RandomState;
use page::{BlockMeta, DataPage};
use registry::{FamilyRegistry, PageFamily};
use std::collections::{BTreeMap, HashMap};
use tracing::{error, info};

/// Lifetime counters for page traffic
#[derive(Debug, Default, Clone, Copy)]
struct PageCounters {
    acquired: u64,
    released: u64,
    release_failures: u64,
}

/// Memory manager
///
/// Owns the family registry, every mapped data page and the block records
/// describing them. Dropping the manager returns all mapped pages to the
/// page source.
pub struct MemoryManager<S: PageSource = MmapPageSource> {
    source: S,
    config: ManagerConfig,
    page_size: Size,
    registry: FamilyRegistry,
    pages: Arena<DataPage>,
    blocks: Arena<BlockMeta>,
    /// Data page base address -> page, for resolving foreign pointers
    page_index: BTreeMap<Address, PageId>,
    /// Payload address -> allocated block
    live: HashMap<Address, BlockId, RandomState>,
    counters: PageCounters,
}

impl MemoryManager<MmapPageSource> {
    /// Query and cache the OS page size, then build an empty manager
    pub fn init() -> MemoryResult<Self> {
        Self::with_config(ManagerConfig::default())
    }

    pub fn with_config(config: ManagerConfig) -> MemoryResult<Self> {
        Self::with_source(MmapPageSource::new(), config)
    }
}

impl<S: PageSource> MemoryManager<S> {
    /// Build a manager on top of an arbitrary page source
    pub fn with_source(source: S, config: ManagerConfig) -> MemoryResult<Self> {
        config.validate()?;
        let page_size = source.page_size();
        if page_size <= BLOCK_HEADER_SIZE * 2 || !page_size.is_power_of_two() {
            return Err(MemoryError::InvalidConfig(format!(
                "unsupported page size {}",
                page_size
            )));
        }

        let registry = FamilyRegistry::new(page_size);
        info!(
            page_size,
            page_units = config.page_units,
            families_per_group = registry.group_capacity(),
            max_data_pages = ?config.max_data_pages,
            "Memory manager initialized"
        );

        Ok(Self {
            source,
            config,
            page_size,
            registry,
            pages: Arena::new(),
            blocks: Arena::new(),
            page_index: BTreeMap::new(),
            live: HashMap::with_hasher(RandomState::new()),
            counters: PageCounters::default(),
        })
    }

    /// Cached OS page size
    #[inline]
    pub fn page_size(&self) -> Size {
        self.page_size
    }

    #[inline]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[inline]
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Bytes of one data page
    #[inline]
    pub fn data_page_len(&self) -> Size {
        self.page_size * self.config.page_units
    }

    /// Largest payload a single allocation can ever receive
    #[inline]
    pub fn max_allocatable(&self) -> Size {
        page::max_allocatable(self.data_page_len())
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a named structure family
    ///
    /// # Panics
    ///
    /// Registering the same name twice is a caller contract violation and
    /// halts with a `DuplicateFamily` fault.
    pub fn register_family(&mut self, name: &str, element_size: u32) -> MemoryResult<FamilyId> {
        self.registry.register(name, element_size)
    }

    pub fn lookup_family(&self, name: &str) -> Option<FamilyId> {
        self.registry.lookup(name)
    }

    pub fn family_info(&self, family: FamilyId) -> Option<FamilyInfo<'_>> {
        self.registry.get(family).map(PageFamily::info)
    }

    /// Registered families, newest group first
    ///
    /// The iterator is lazy and can be cloned to restart the walk.
    pub fn families(&self) -> impl Iterator<Item = FamilyInfo<'_>> + Clone + '_ {
        self.registry.iter().map(|(_, family)| family.info())
    }

    /// Log every registered family at info level
    pub fn print_registered_families(&self) {
        for info in self.families() {
            info!(family = info.name, size = info.element_size, "Page family");
        }
    }

    // ========================================================================
    // Internal accessors
    // ========================================================================

    fn family(&self, id: FamilyId) -> MemoryResult<&PageFamily> {
        self.registry
            .get(id)
            .ok_or_else(|| MemoryError::FamilyNotFound(id.to_string()))
    }

    fn family_mut(&mut self, id: FamilyId) -> MemoryResult<&mut PageFamily> {
        self.registry
            .get_mut(id)
            .ok_or_else(|| MemoryError::FamilyNotFound(id.to_string()))
    }

    fn page(&self, id: PageId) -> MemoryResult<&DataPage> {
        self.pages
            .get(id.into())
            .ok_or_else(|| MemoryError::CorruptState(format!("dangling {}", id)))
    }

    fn page_mut(&mut self, id: PageId) -> MemoryResult<&mut DataPage> {
        self.pages
            .get_mut(id.into())
            .ok_or_else(|| MemoryError::CorruptState(format!("dangling {}", id)))
    }

    fn block(&self, id: BlockId) -> MemoryResult<&BlockMeta> {
        self.blocks
            .get(id.into())
            .ok_or_else(|| MemoryError::CorruptState(format!("dangling {}", id)))
    }

    fn block_mut(&mut self, id: BlockId) -> MemoryResult<&mut BlockMeta> {
        self.blocks
            .get_mut(id.into())
            .ok_or_else(|| MemoryError::CorruptState(format!("dangling {}", id)))
    }

    /// Data page whose mapping contains `address`
    fn page_containing(&self, address: Address) -> Option<PageId> {
        let (_, &page_id) = self.page_index.range(..=address).next_back()?;
        let page = self.pages.get(page_id.into())?;
        page.region.contains(address).then_some(page_id)
    }
}

impl<S: PageSource> Drop for MemoryManager<S> {
    fn drop(&mut self) {
        let pages = self.pages.drain();
        if pages.is_empty() {
            return;
        }

        info!(
            pages = pages.len(),
            live_allocations = self.live.len(),
            "Returning data pages on shutdown"
        );
        for page in pages {
            let address = page.region.address();
            if let Err(e) = self.source.release(page.region) {
                error!(address, error = %e, "Could not return data page on shutdown");
            }
        }
    }
}
