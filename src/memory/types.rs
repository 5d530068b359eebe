/*!
 * Memory Types
 * Errors, faults and introspection records for the family allocator
 */

use crate::core::types::{BlockId, PageId, Size};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Recoverable memory errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum MemoryError {
    #[error("Structure {name} size {size} exceeds system page size {page_size}")]
    #[diagnostic(
        code(memory::size_exceeds_page),
        help("A family's element must fit in one OS page.")
    )]
    SizeExceedsPage {
        name: String,
        size: Size,
        page_size: Size,
    },

    #[error("Structure {name} has invalid element size {size}")]
    #[diagnostic(code(memory::invalid_element_size))]
    InvalidElementSize { name: String, size: Size },

    #[error("Invalid family name {0:?}")]
    #[diagnostic(
        code(memory::invalid_family_name),
        help("Names must be 1 to 31 bytes without NUL characters.")
    )]
    InvalidFamilyName(String),

    #[error("Structure {0} is not registered with the memory manager")]
    #[diagnostic(
        code(memory::family_not_found),
        help("Register the family before allocating from it.")
    )]
    FamilyNotFound(String),

    #[error("Allocation of zero units requested")]
    #[diagnostic(code(memory::zero_units))]
    ZeroUnits,

    #[error("Memory requested exceeds page size: {requested} bytes, at most {max} bytes per page")]
    #[diagnostic(
        code(memory::request_too_large),
        help("Split the request or raise page_units in the manager config.")
    )]
    RequestTooLarge { requested: Size, max: Size },

    #[error("Out of memory: could not map {units} page(s): {reason}")]
    #[diagnostic(code(memory::out_of_memory))]
    OutOfMemory { units: usize, reason: String },

    #[error("Could not return {units} page(s) at 0x{address:x} to the OS: {reason}")]
    #[diagnostic(code(memory::release_failed))]
    ReleaseFailed {
        address: usize,
        units: usize,
        reason: String,
    },

    #[error("Invalid memory address: 0x{0:x}")]
    #[diagnostic(
        code(memory::invalid_address),
        help("The pointer was not returned by this memory manager.")
    )]
    InvalidAddress(usize),

    #[error("Corrupt allocator state: {0}")]
    #[diagnostic(code(memory::corrupt_state))]
    CorruptState(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(memory::invalid_config))]
    InvalidConfig(String),
}

/// Irrecoverable faults
///
/// These are programmer-error traps: continuing after one would corrupt the
/// heap. They are never returned as values from the allocation API; they are
/// raised with [`Fault::raise`], or reported by `validate()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("duplicate registration of page family {0}")]
    DuplicateFamily(String),

    #[error("double free of block at 0x{address:x} in {page}")]
    DoubleFree { address: usize, page: PageId },

    #[error("merge of {first} and {second} requires both blocks free")]
    MergeNonFree { first: BlockId, second: BlockId },

    #[error("header of {block} corrupted (offset {offset}): {detail}")]
    HeaderCorrupted {
        block: BlockId,
        offset: usize,
        detail: String,
    },

    #[error("layout violation in {page}: {detail}")]
    LayoutViolation { page: PageId, detail: String },
}

impl Fault {
    /// Log the fault and halt
    #[track_caller]
    #[cold]
    pub fn raise(self) -> ! {
        let location = std::panic::Location::caller();
        error!(fault = %self, location = %location, "memory manager fault");
        panic!("memory manager fault: {}", self);
    }
}

/// Name and element size of a registered family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FamilyInfo<'a> {
    pub name: &'a str,
    pub element_size: u32,
}

/// One block in a page's chain, as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Header offset from the start of the page
    pub offset: Size,
    /// Payload bytes, excluding the header
    pub size: Size,
    pub is_free: bool,
}

/// Per-family usage summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyUsage {
    pub name: String,
    pub element_size: u32,
    pub pages: usize,
    pub allocated_blocks: usize,
    pub allocated_bytes: Size,
    pub free_blocks: usize,
    pub free_bytes: Size,
    pub largest_free_block: Option<Size>,
}

/// Memory statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub page_size: Size,
    pub page_units: usize,
    pub families: usize,
    pub family_groups: usize,
    pub data_pages: usize,
    pub pages_acquired: u64,
    pub pages_released: u64,
    pub release_failures: u64,
    pub allocated_blocks: usize,
    pub allocated_bytes: Size,
    pub free_blocks: usize,
    pub free_bytes: Size,
}

impl MemoryStats {
    /// Share of mapped payload capacity currently handed out (0.0 - 100.0)
    pub fn usage_percentage(&self) -> f64 {
        let capacity = self.allocated_bytes + self.free_bytes;
        if capacity == 0 {
            return 0.0;
        }
        (self.allocated_bytes as f64 / capacity as f64) * 100.0
    }
}
