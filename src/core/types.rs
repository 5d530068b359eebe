/*!
 * Core Types
 * Common types used across the memory manager
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address type for memory operations
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

// ============================================================================
// Type-Safe Handle Wrappers
// ============================================================================

/// Generational slot in an arena
///
/// The generation changes every time a slot is reused, so a stale handle
/// never resolves to the record that later took its place.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Slot {
    pub index: u32,
    pub generation: u32,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Registered page family (group position, slot within the group)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FamilyId {
    pub group: u32,
    pub slot: u32,
}

/// Data page owned by one family
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PageId(pub Slot);

/// Block record inside a data page
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockId(pub Slot);

impl From<Slot> for PageId {
    #[inline]
    fn from(slot: Slot) -> Self {
        PageId(slot)
    }
}

impl From<PageId> for Slot {
    #[inline]
    fn from(id: PageId) -> Self {
        id.0
    }
}

impl From<Slot> for BlockId {
    #[inline]
    fn from(slot: Slot) -> Self {
        BlockId(slot)
    }
}

impl From<BlockId> for Slot {
    #[inline]
    fn from(id: BlockId) -> Self {
        id.0
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "family#{}.{}", self.group, self.slot)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page#{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}
