/*!
 * System Limits and Constants
 *
 * Centralized location for layout sizes and registry bounds.
 * Header sizes describe a 64-bit layout and are reserved inside every data
 * page even though the bookkeeping itself lives in the manager's arenas.
 */

// =============================================================================
// REGISTRY LIMITS
// =============================================================================

/// Size of the name field in a family record
/// One byte stays reserved for the terminator, so names hold at most 31 bytes
pub const MAX_FAMILY_NAME_LEN: usize = 32;

/// Bytes one family record occupies inside a family group
/// name (32) + element size (4) + padding (4) + page list head (8) + free index head (16)
pub const FAMILY_RECORD_SIZE: usize = 64;

/// Bytes at the start of a family group before the record array (next-group link)
pub const GROUP_HEADER_SIZE: usize = 8;

// =============================================================================
// PAGE LAYOUT
// =============================================================================

/// Data page header: prev/next page links, family back reference, page index
pub const PAGE_HEADER_SIZE: usize = 32;

/// Bytes reserved ahead of every payload for block bookkeeping
/// flag + size + offset (12) + padding (4) + free index links (16) + chain links (16)
pub const BLOCK_HEADER_SIZE: usize = 48;

/// Leading bytes of a block header holding the integrity tag
pub const BLOCK_TAG_SIZE: usize = 16;

/// Magic word stamped into every block header ("MMBK")
pub const BLOCK_TAG_MAGIC: u32 = 0x4D4D_424B;

/// Offset of the first block header from the start of a data page
pub const FIRST_BLOCK_OFFSET: usize = PAGE_HEADER_SIZE;

/// Fallback when the OS page size cannot be queried
pub const DEFAULT_PAGE_SIZE: usize = 4096;

// =============================================================================
// CONFIGURATION DEFAULTS
// =============================================================================

/// OS pages per data page
pub const DEFAULT_PAGE_UNITS: usize = 1;

/// Largest accepted `page_units` setting
pub const MAX_PAGE_UNITS: usize = 1024;

const _: () = assert!(BLOCK_TAG_SIZE <= BLOCK_HEADER_SIZE);
