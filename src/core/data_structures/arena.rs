/*!
 * Generational Arena
 * Stable-handle storage for linked records
 */

use crate::core::types::Slot;

enum Entry<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

/// Growable store addressed by generational [`Slot`] handles
///
/// # Performance
///
/// - **Insert**: O(1), reuses the most recently vacated slot first
/// - **Lookup/Remove**: O(1), a stale handle resolves to `None`
///
/// Linked structures (page lists, block chains) keep `Slot`s instead of
/// pointers, so unlinking a record can never leave a dangling reference.
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Store a value and return its handle
    pub fn insert(&mut self, value: T) -> Slot {
        self.insert_with(|_| value)
    }

    /// Store a value built from the handle it is about to receive
    pub fn insert_with(&mut self, build: impl FnOnce(Slot) -> T) -> Slot {
        let slot = self.next_slot();
        let entry = Entry::Occupied {
            generation: slot.generation,
            value: build(slot),
        };

        if slot.index as usize == self.entries.len() {
            self.entries.push(entry);
        } else {
            if let Entry::Vacant { next_free, .. } = self.entries[slot.index as usize] {
                self.free_head = next_free;
            }
            self.entries[slot.index as usize] = entry;
        }
        self.len += 1;
        slot
    }

    /// Handle the next insert will return
    fn next_slot(&self) -> Slot {
        match self.free_head {
            Some(index) => match self.entries[index as usize] {
                Entry::Vacant { generation, .. } => Slot {
                    index,
                    generation: generation.wrapping_add(1),
                },
                Entry::Occupied { .. } => unreachable!("free list points at an occupied slot"),
            },
            None => Slot {
                index: self.entries.len() as u32,
                generation: 0,
            },
        }
    }

    #[inline]
    pub fn get(&self, slot: Slot) -> Option<&T> {
        match self.entries.get(slot.index as usize) {
            Some(Entry::Occupied { generation, value }) if *generation == slot.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut T> {
        match self.entries.get_mut(slot.index as usize) {
            Some(Entry::Occupied { generation, value }) if *generation == slot.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn contains(&self, slot: Slot) -> bool {
        self.get(slot).is_some()
    }

    /// Remove a value, vacating its slot for reuse
    pub fn remove(&mut self, slot: Slot) -> Option<T> {
        let entry = self.entries.get_mut(slot.index as usize)?;
        match entry {
            Entry::Occupied { generation, .. } if *generation == slot.generation => {}
            _ => return None,
        }

        let vacant = Entry::Vacant {
            generation: slot.generation,
            next_free: self.free_head,
        };
        let old = std::mem::replace(entry, vacant);
        self.free_head = Some(slot.index);
        self.len -= 1;

        match old {
            Entry::Occupied { value, .. } => Some(value),
            Entry::Vacant { .. } => None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &T)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Entry::Occupied { generation, value } => Some((
                    Slot {
                        index: index as u32,
                        generation: *generation,
                    },
                    value,
                )),
                Entry::Vacant { .. } => None,
            })
    }

    /// Remove every live entry, yielding them in slot order
    pub fn drain(&mut self) -> Vec<T> {
        self.free_head = None;
        self.len = 0;
        std::mem::take(&mut self.entries)
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Occupied { value, .. } => Some(value),
                Entry::Vacant { .. } => None,
            })
            .collect()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
