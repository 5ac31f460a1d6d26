//! Held-state aggregate store
//!
//! Per-key aggregate state addressed by a stable slot index. Callers look a
//! key up once and then mutate the state in place through the index, so the
//! hot path never copies aggregate states.

use std::collections::HashMap;
use std::hash::Hash;

/// Aggregate state currently held for one key
#[derive(Debug, Clone, PartialEq)]
pub struct HeldState<S> {
    /// Incremental aggregate state
    pub state: S,
    /// Sync time since which the current result has been valid
    pub timestamp: i64,
    /// Net number of contributions backing `state`; zero or less means evictable
    pub active: i64,
}

impl<S> HeldState<S> {
    pub fn new(state: S, timestamp: i64) -> Self {
        Self {
            state,
            timestamp,
            active: 0,
        }
    }
}

#[derive(Debug)]
struct HeldEntry<K, S> {
    key: K,
    hash: u32,
    pending: bool,
    value: HeldState<S>,
}

/// Slot-indexed map from key to [`HeldState`]
///
/// Removed slots are recycled, so an index is only meaningful until the entry
/// it names is removed. Accessors panic on a vacant index, as slice indexing
/// does out of bounds.
#[derive(Debug)]
pub struct HeldStateStore<K, S> {
    index: HashMap<K, usize>,
    entries: Vec<Option<HeldEntry<K, S>>>,
    free: Vec<usize>,
}

impl<K, S> Default for HeldStateStore<K, S> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<K, S> HeldStateStore<K, S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn slot(&self, index: usize) -> &HeldEntry<K, S> {
        self.entries[index]
            .as_ref()
            .expect("held state slot is vacant")
    }

    fn slot_mut(&mut self, index: usize) -> &mut HeldEntry<K, S> {
        self.entries[index]
            .as_mut()
            .expect("held state slot is vacant")
    }

    pub fn get(&self, index: usize) -> &HeldState<S> {
        &self.slot(index).value
    }

    pub fn get_mut(&mut self, index: usize) -> &mut HeldState<S> {
        &mut self.slot_mut(index).value
    }

    pub fn key(&self, index: usize) -> &K {
        &self.slot(index).key
    }

    /// Key, hash and mutable state of slot `index` at once
    pub fn entry_mut(&mut self, index: usize) -> (&K, u32, &mut HeldState<S>) {
        let entry = self.slot_mut(index);
        (&entry.key, entry.hash, &mut entry.value)
    }

    /// Flag slot `index` as pending output for the current tick.
    ///
    /// Returns `true` if it was not pending before.
    pub fn mark_pending(&mut self, index: usize) -> bool {
        let entry = self.slot_mut(index);
        !std::mem::replace(&mut entry.pending, true)
    }

    pub fn clear_pending(&mut self, index: usize) {
        self.slot_mut(index).pending = false;
    }

    pub fn is_pending(&self, index: usize) -> bool {
        self.slot(index).pending
    }

    /// Remove every entry, yielding the states for disposal
    pub fn drain_states(&mut self) -> impl Iterator<Item = S> + '_ {
        self.index.clear();
        self.free.clear();
        self.entries.drain(..).flatten().map(|entry| entry.value.state)
    }
}

impl<K: Eq + Hash + Clone, S> HeldStateStore<K, S> {
    /// Find the slot index of `key`
    pub fn lookup(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Insert `key`, which must not already be present, and return its slot index
    pub fn insert(&mut self, key: K, hash: u32, value: HeldState<S>) -> usize {
        debug_assert!(!self.index.contains_key(&key), "key inserted twice");
        let entry = HeldEntry {
            key: key.clone(),
            hash,
            pending: false,
            value,
        };
        let index = match self.free.pop() {
            Some(slot) => {
                self.entries[slot] = Some(entry);
                slot
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };
        self.index.insert(key, index);
        index
    }

    /// Remove slot `index`, returning its key and state
    pub fn remove(&mut self, index: usize) -> (K, HeldState<S>) {
        let entry = self.entries[index]
            .take()
            .expect("held state slot is vacant");
        self.index.remove(&entry.key);
        self.free.push(index);
        (entry.key, entry.value)
    }
}
