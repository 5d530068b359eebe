/*!
 * Virtual Page Source
 * Anonymous mmap-backed pages straight from the kernel
 */

use super::traits::{PageSource, VmRegion};
use super::types::{MemoryError, MemoryResult};
use crate::core::limits::DEFAULT_PAGE_SIZE;
use crate::core::types::Size;
use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};
use nix::unistd::{sysconf, SysconfVar};
use std::num::NonZeroUsize;
use std::ptr::NonNull;
use std::sync::OnceLock;
use tracing::{debug, error, warn};

static SYSTEM_PAGE_SIZE: OnceLock<Size> = OnceLock::new();

/// OS page size, queried once and cached for the process lifetime
pub fn system_page_size() -> Size {
    *SYSTEM_PAGE_SIZE.get_or_init(|| match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) if size > 0 => size as Size,
        Ok(_) => {
            warn!(
                fallback = DEFAULT_PAGE_SIZE,
                "sysconf reported no page size, using fallback"
            );
            DEFAULT_PAGE_SIZE
        }
        Err(e) => {
            warn!(error = %e, fallback = DEFAULT_PAGE_SIZE, "Could not query page size");
            DEFAULT_PAGE_SIZE
        }
    })
}

/// Page source that maps private anonymous memory with `mmap`
#[derive(Debug, Clone, Copy)]
pub struct MmapPageSource {
    page_size: Size,
}

impl MmapPageSource {
    pub fn new() -> Self {
        Self {
            page_size: system_page_size(),
        }
    }
}

impl Default for MmapPageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSource for MmapPageSource {
    fn page_size(&self) -> Size {
        self.page_size
    }

    fn acquire(&mut self, units: usize) -> MemoryResult<VmRegion> {
        let len = units
            .checked_mul(self.page_size)
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| MemoryError::OutOfMemory {
                units,
                reason: "invalid mapping length".to_string(),
            })?;

        // SAFETY: anonymous private mapping at an address of the kernel's
        // choosing; no existing memory is aliased.
        let mapped = unsafe {
            mmap_anonymous(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS,
            )
        };

        let base = match mapped {
            Ok(ptr) => ptr.cast::<u8>(),
            Err(errno) => {
                error!(units, error = %errno, "VM page allocation failed");
                return Err(MemoryError::OutOfMemory {
                    units,
                    reason: errno.to_string(),
                });
            }
        };

        // Anonymous mappings arrive zero-filled.
        // SAFETY: the mapping is at least one byte long and exclusively ours.
        debug_assert_eq!(unsafe { base.as_ptr().read() }, 0);

        debug!(units, address = base.as_ptr() as usize, "Mapped VM pages");

        // SAFETY: released only through `release` below.
        Ok(unsafe { VmRegion::from_raw_parts(base, units, len.get()) })
    }

    fn release(&mut self, region: VmRegion) -> MemoryResult<()> {
        let address = region.address();
        let units = region.units();
        let base: NonNull<std::ffi::c_void> = region.base().cast();

        // SAFETY: the region came from `acquire` and is released once.
        match unsafe { munmap(base, region.len()) } {
            Ok(()) => {
                debug!(units, address, "Unmapped VM pages");
                Ok(())
            }
            Err(errno) => {
                error!(units, address, error = %errno, "Could not munmap VM page");
                Err(MemoryError::ReleaseFailed {
                    address,
                    units,
                    reason: errno.to_string(),
                })
            }
        }
    }
}
