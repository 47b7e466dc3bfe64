use std::collections::HashMap;

use crate::object::ObjectId;

/// Result of [`SparseIndexTable::insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Insertion {
    pub slot: u32,
    pub is_new: bool,
}

/// Result of a swap-removal. `moved` is the object that was relocated from
/// the last slot into `slot`, if the removed slot was not already the last.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Removal {
    pub slot: u32,
    pub removed: ObjectId,
    pub moved: Option<ObjectId>,
    pub moved_from: u32,
}

/// Maps stable object identities to dense slots.
///
/// - `sparse[id]` -> slot
/// - `ids[slot]`  -> id
///
/// Slots always form the contiguous range `0..len()`.
#[derive(Clone, Debug, Default)]
pub struct SparseIndexTable {
    sparse: HashMap<ObjectId, u32>,
    ids: Vec<ObjectId>,
}

impl SparseIndexTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SparseIndexTable {
            sparse: HashMap::with_capacity(capacity),
            ids: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.sparse.reserve(additional);
        self.ids.reserve(additional);
    }

    pub fn capacity(&self) -> usize {
        self.ids.capacity()
    }

    /// Returns the existing slot for `id`, or appends it at the end.
    pub fn insert(&mut self, id: ObjectId) -> Insertion {
        assert!(!id.is_none(), "the none id cannot be tracked");

        if let Some(&slot) = self.sparse.get(&id) {
            return Insertion {
                slot,
                is_new: false,
            };
        }

        let slot = self.ids.len() as u32;
        self.sparse.insert(id, slot);
        self.ids.push(id);

        Insertion { slot, is_new: true }
    }

    pub fn slot_of(&self, id: ObjectId) -> Option<u32> {
        self.sparse.get(&id).copied()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.sparse.contains_key(&id)
    }

    pub fn id_at(&self, slot: u32) -> Option<ObjectId> {
        self.ids.get(slot as usize).copied()
    }

    pub fn ids(&self) -> &[ObjectId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, ObjectId)> + '_ {
        self.ids.iter().enumerate().map(|(slot, &id)| (slot as u32, id))
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<Removal> {
        let slot = self.slot_of(id)?;
        Some(self.swap_remove(slot))
    }

    /// Removes `slot`, moving the last slot into the hole.
    ///
    /// # Panics
    /// Panics if `slot` is out of range.
    pub fn swap_remove(&mut self, slot: u32) -> Removal {
        let last = self.ids.len() as u32 - 1;
        let removed = self.ids.swap_remove(slot as usize);
        self.sparse.remove(&removed);

        // The element that was in the last slot is now at `slot`
        let moved = if slot != last {
            let moved_id = self.ids[slot as usize];
            self.sparse.insert(moved_id, slot);
            Some(moved_id)
        } else {
            None
        };

        debug_assert_eq!(self.sparse.len(), self.ids.len(), "sparse/dense out of sync");

        Removal {
            slot,
            removed,
            moved,
            moved_from: last,
        }
    }

    pub fn clear(&mut self) {
        self.sparse.clear();
        self.ids.clear();
    }
}

#[cfg(test)]
#[path = "index.tests.rs"]
mod tests;
