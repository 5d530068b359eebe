/*!
 * Page-Family Registry
 * Named structure families packed into fixed-capacity groups
 */

use super::free_list::FreeBlockIndex;
use crate::core::data_structures::FamilyName;
use crate::core::limits::{FAMILY_RECORD_SIZE, GROUP_HEADER_SIZE};
use crate::core::types::{FamilyId, PageId, Size};
use crate::memory::types::{Fault, FamilyInfo, MemoryError, MemoryResult};
use tracing::{info, warn};

/// Metadata for one registered structure type
#[derive(Debug)]
pub(crate) struct PageFamily {
    pub name: FamilyName,
    pub element_size: u32,
    /// Head of the data page list, most recently added first
    pub first_page: Option<PageId>,
    pub page_count: usize,
    pub free_blocks: FreeBlockIndex,
}

impl PageFamily {
    fn new(name: FamilyName, element_size: u32) -> Self {
        Self {
            name,
            element_size,
            first_page: None,
            page_count: 0,
            free_blocks: FreeBlockIndex::new(),
        }
    }

    pub fn info(&self) -> FamilyInfo<'_> {
        FamilyInfo {
            name: self.name.as_str(),
            element_size: self.element_size,
        }
    }
}

/// Fixed-capacity array of family records, sized to what one OS page holds
#[derive(Debug)]
struct FamilyGroup {
    families: Vec<PageFamily>,
}

impl FamilyGroup {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            families: Vec::with_capacity(capacity),
        }
    }
}

/// Registry of page families
///
/// Groups are kept in creation order internally; every walk visits the
/// newest group first, then slots in registration order.
#[derive(Debug)]
pub(crate) struct FamilyRegistry {
    groups: Vec<FamilyGroup>,
    group_capacity: usize,
    page_size: Size,
    len: usize,
}

impl FamilyRegistry {
    pub fn new(page_size: Size) -> Self {
        let group_capacity =
            (page_size.saturating_sub(GROUP_HEADER_SIZE) / FAMILY_RECORD_SIZE).max(1);
        Self {
            groups: Vec::new(),
            group_capacity,
            page_size,
            len: 0,
        }
    }

    /// Families one group holds
    pub fn group_capacity(&self) -> usize {
        self.group_capacity
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Register a new family
    ///
    /// Registering a name twice is a fault, not an error.
    pub fn register(&mut self, name: &str, element_size: u32) -> MemoryResult<FamilyId> {
        let size = element_size as Size;
        if size > self.page_size {
            warn!(
                family = name,
                size,
                page_size = self.page_size,
                "Structure size exceeds system page size"
            );
            return Err(MemoryError::SizeExceedsPage {
                name: name.to_string(),
                size,
                page_size: self.page_size,
            });
        }
        if element_size == 0 {
            return Err(MemoryError::InvalidElementSize {
                name: name.to_string(),
                size,
            });
        }
        let family_name = FamilyName::new(name).map_err(MemoryError::InvalidFamilyName)?;

        if self.lookup(name).is_some() {
            Fault::DuplicateFamily(name.to_string()).raise();
        }

        let needs_group = self
            .groups
            .last()
            .map_or(true, |group| group.families.len() == self.group_capacity);
        if needs_group {
            self.groups.push(FamilyGroup::with_capacity(self.group_capacity));
            info!(
                groups = self.groups.len(),
                capacity = self.group_capacity,
                "Started new page family group"
            );
        }

        let group_index = self.groups.len() - 1;
        let group = &mut self.groups[group_index];
        group.families.push(PageFamily::new(family_name, element_size));
        self.len += 1;

        let id = FamilyId {
            group: group_index as u32,
            slot: (group.families.len() - 1) as u32,
        };
        info!(family = name, element_size, id = %id, "Registered page family");
        Ok(id)
    }

    /// Find a family by name (newest group first)
    pub fn lookup(&self, name: &str) -> Option<FamilyId> {
        self.iter()
            .find(|(_, family)| family.name.as_str() == name)
            .map(|(id, _)| id)
    }

    pub fn get(&self, id: FamilyId) -> Option<&PageFamily> {
        self.groups
            .get(id.group as usize)?
            .families
            .get(id.slot as usize)
    }

    pub fn get_mut(&mut self, id: FamilyId) -> Option<&mut PageFamily> {
        self.groups
            .get_mut(id.group as usize)?
            .families
            .get_mut(id.slot as usize)
    }

    pub fn iter(&self) -> FamilyIter<'_> {
        FamilyIter {
            groups: &self.groups,
            group: self.groups.len(),
            slot: 0,
            capacity: self.group_capacity,
        }
    }
}

/// Lazy, restartable walk over registered families
///
/// Stops at the end of each group's used slots or at group capacity,
/// whichever comes first, then moves on to the next older group.
#[derive(Clone)]
pub(crate) struct FamilyIter<'a> {
    groups: &'a [FamilyGroup],
    /// One past the group currently walked (counts down to zero)
    group: usize,
    slot: usize,
    capacity: usize,
}

impl<'a> Iterator for FamilyIter<'a> {
    type Item = (FamilyId, &'a PageFamily);

    fn next(&mut self) -> Option<Self::Item> {
        while self.group > 0 {
            let group_index = self.group - 1;
            let families = &self.groups[group_index].families;

            if self.slot < families.len() && self.slot < self.capacity {
                let id = FamilyId {
                    group: group_index as u32,
                    slot: self.slot as u32,
                };
                let family = &families[self.slot];
                self.slot += 1;
                return Some((id, family));
            }

            self.group -= 1;
            self.slot = 0;
        }
        None
    }
}
