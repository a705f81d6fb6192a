//! Id-stable slot storage.
//!
//! A record's id is its index in `slots`. Removing a record leaves a hole that
//! is queued for reuse; new records take the earliest-freed hole before the
//! storage grows. The queue gives reuse order and the set gives O(1)
//! membership, so `contains` never scans.

use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone)]
pub struct SlotStore<T> {
    slots: Vec<Option<T>>,
    free_queue: VecDeque<u32>,
    free_set: HashSet<u32>,
}

impl<T> Default for SlotStore<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free_queue: VecDeque::new(),
            free_set: HashSet::new(),
        }
    }
}

impl<T> SlotStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new record, building it from the id it will occupy.
    pub fn insert_with(&mut self, build: impl FnOnce(u32) -> T) -> u32 {
        if let Some(id) = self.free_queue.pop_front() {
            self.free_set.remove(&id);
            self.slots[id as usize] = Some(build(id));
            return id;
        }
        let id = self.slots.len() as u32;
        self.slots.push(Some(build(id)));
        id
    }

    /// Store a record under an explicit id, as read back from persistence.
    ///
    /// Every gap between the current capacity and `id` becomes a free hole.
    /// Loading into an existing hole claims it. Returns the displaced record
    /// when `id` was already live.
    pub fn insert_at(&mut self, id: u32, value: T) -> Option<T> {
        let idx = id as usize;
        while self.slots.len() < idx {
            let hole = self.slots.len() as u32;
            self.slots.push(None);
            self.free_queue.push_back(hole);
            self.free_set.insert(hole);
        }
        if idx == self.slots.len() {
            self.slots.push(Some(value));
            return None;
        }
        if self.free_set.remove(&id) {
            self.free_queue.retain(|&free| free != id);
        }
        self.slots[idx].replace(value)
    }

    pub fn remove(&mut self, id: u32) -> Option<T> {
        let removed = self.slots.get_mut(id as usize)?.take()?;
        self.free_queue.push_back(id);
        self.free_set.insert(id);
        Some(removed)
    }

    pub fn contains(&self, id: u32) -> bool {
        (id as usize) < self.slots.len() && !self.free_set.contains(&id)
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.slots.get(id as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.slots.get_mut(id as usize)?.as_mut()
    }

    /// Live records in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|value| (idx as u32, value)))
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live records plus holes.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_free(&self, id: u32) -> bool {
        self.free_set.contains(&id)
    }

    /// Free ids in reuse order.
    pub fn free_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.free_queue.iter().copied()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn check_invariants<T>(store: &SlotStore<T>) {
        for (id, _) in store.iter() {
            assert!((id as usize) < store.capacity());
            assert!(!store.is_free(id));
        }
        assert_eq!(store.free_ids().count(), store.free_set.len());
        assert_eq!(store.iter().count(), store.len());
    }

    #[test]
    fn ids_are_dense_from_zero() {
        let mut store = SlotStore::new();
        assert_eq!(store.insert_with(|id| id * 10), 0);
        assert_eq!(store.insert_with(|id| id * 10), 1);
        assert_eq!(store.insert_with(|id| id * 10), 2);
        assert_eq!(store.get(2), Some(&20));
        check_invariants(&store);
    }

    #[test]
    fn earliest_freed_hole_is_reused_first() {
        let mut store = SlotStore::new();
        for _ in 0..5 {
            store.insert_with(|id| id);
        }
        store.remove(3);
        store.remove(1);

        assert!(!store.contains(3));
        assert_eq!(store.insert_with(|id| id), 3);
        assert_eq!(store.insert_with(|id| id), 1);
        assert_eq!(store.insert_with(|id| id), 5);
        assert_eq!(store.capacity(), 6);
        check_invariants(&store);
    }

    #[test]
    fn removing_twice_is_a_no_op() {
        let mut store = SlotStore::new();
        store.insert_with(|_| "a");
        assert_eq!(store.remove(0), Some("a"));
        assert_eq!(store.remove(0), None);
        assert_eq!(store.remove(42), None);
        assert_eq!(store.free_ids().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn sparse_load_registers_gaps_as_free() {
        let mut store = SlotStore::new();
        store.insert_at(0, "zero");
        store.insert_at(3, "three");
        store.insert_at(5, "five");

        assert_eq!(store.capacity(), 6);
        assert_eq!(store.len(), 3);
        assert_eq!(store.free_ids().collect::<Vec<_>>(), vec![1, 2, 4]);
        assert!(store.contains(3));
        assert!(!store.contains(4));

        assert_eq!(store.insert_with(|_| "new"), 1);
        check_invariants(&store);
    }

    #[test]
    fn load_into_existing_hole_claims_it() {
        let mut store = SlotStore::new();
        store.insert_at(4, 'e');
        store.insert_at(2, 'c');

        assert!(store.contains(2));
        assert_eq!(store.free_ids().collect::<Vec<_>>(), vec![0, 1, 3]);
        check_invariants(&store);
    }
}
