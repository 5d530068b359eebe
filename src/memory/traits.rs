/*!
 * Memory Traits
 * Page source abstraction between the allocator and the OS
 */

use super::types::MemoryResult;
use crate::core::types::{Address, Size};
use std::ptr::NonNull;

/// Owned run of whole virtual-memory pages
///
/// Produced by a [`PageSource`] and handed back to the same source on
/// release. Not `Clone`: exactly one owner may release a region.
#[derive(Debug, PartialEq, Eq)]
pub struct VmRegion {
    base: NonNull<u8>,
    units: usize,
    len: Size,
}

impl VmRegion {
    /// Wrap a mapping produced by a page source
    ///
    /// # Safety
    ///
    /// `base` must point to `len` readable and writable bytes that stay
    /// valid until the region is passed back to the source that created it.
    pub unsafe fn from_raw_parts(base: NonNull<u8>, units: usize, len: Size) -> Self {
        Self { base, units, len }
    }

    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    #[inline]
    pub fn address(&self) -> Address {
        self.base.as_ptr() as Address
    }

    /// Number of OS pages in the region
    #[inline]
    pub fn units(&self) -> usize {
        self.units
    }

    #[inline]
    pub fn len(&self) -> Size {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn contains(&self, address: Address) -> bool {
        address >= self.address() && address < self.address() + self.len
    }
}

/// Provider of zero-filled, page-aligned memory in whole-page units
#[cfg_attr(test, mockall::automock)]
pub trait PageSource {
    /// OS page size in bytes
    fn page_size(&self) -> Size;

    /// Map `units` pages of zeroed read/write memory
    fn acquire(&mut self, units: usize) -> MemoryResult<VmRegion>;

    /// Return a region obtained from [`PageSource::acquire`]
    fn release(&mut self, region: VmRegion) -> MemoryResult<()>;
}
