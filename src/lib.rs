/*!
 * Family Memory Manager
 * Type-aware page allocator exposed as a library
 *
 * Structure types are registered as named page families; allocations are
 * served in whole elements of a family from OS pages dedicated to it.
 *
 * ```
 * use family_mm::MemoryManager;
 *
 * let mut mm = MemoryManager::init().unwrap();
 * mm.register_family("Emp", 128).unwrap();
 *
 * let emp = mm.allocate("Emp", 1).unwrap();
 * let emps = mm.allocate("Emp", 4).unwrap();
 * mm.release(emp).unwrap();
 * mm.release(emps).unwrap();
 * assert_eq!(mm.stats().data_pages, 0);
 * ```
 */

pub mod core;
pub mod memory;
pub mod monitoring;

// Re-exports
pub use crate::core::types::{Address, BlockId, FamilyId, PageId, Size};
pub use memory::{
    BlockInfo, Fault, FamilyInfo, FamilyUsage, ManagerConfig, MemoryError, MemoryManager,
    MemoryResult, MemoryStats, MmapPageSource, PageSource, VmRegion,
};
pub use monitoring::init_tracing;
