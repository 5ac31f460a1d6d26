//! Expired change queue
//!
//! Interval events know their end time on arrival, so their retraction is
//! scheduled instead of waiting for an end edge. The queue maps a future sync
//! time to the per-key aggregate of every contribution that expires then.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Aggregate delta and the number of contributions folded into it
#[derive(Debug, Clone, PartialEq)]
pub struct StateAndActive<S> {
    pub state: S,
    pub active: i64,
}

/// All contributions expiring at one sync time, grouped by key
///
/// Keys keep their insertion order so draining a bucket is deterministic.
#[derive(Debug)]
pub struct ChangeBucket<K, S> {
    index: HashMap<K, usize>,
    entries: Vec<(K, u32, StateAndActive<S>)>,
}

impl<K, S> Default for ChangeBucket<K, S> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<K, S> ChangeBucket<K, S> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take every `(key, hash, delta)` out in insertion order
    pub fn drain(&mut self) -> std::vec::Drain<'_, (K, u32, StateAndActive<S>)> {
        self.index.clear();
        self.entries.drain(..)
    }
}

impl<K: Eq + Hash + Clone, S> ChangeBucket<K, S> {
    fn entry(&mut self, key: &K, hash: u32, init: impl FnOnce() -> S) -> &mut StateAndActive<S> {
        let slot = match self.index.get(key) {
            Some(slot) => *slot,
            None => {
                let slot = self.entries.len();
                self.entries.push((
                    key.clone(),
                    hash,
                    StateAndActive {
                        state: init(),
                        active: 0,
                    },
                ));
                self.index.insert(key.clone(), slot);
                slot
            }
        };
        &mut self.entries[slot].2
    }
}

/// Ordered map from expiry time to [`ChangeBucket`]
///
/// Consumed buckets go back to a small pool so steady-state operation does
/// not reallocate bucket storage.
#[derive(Debug)]
pub struct ExpiredChangeQueue<K, S> {
    queue: BTreeMap<i64, ChangeBucket<K, S>>,
    pool: Vec<ChangeBucket<K, S>>,
    pool_limit: usize,
}

impl<K, S> ExpiredChangeQueue<K, S> {
    pub fn new(pool_limit: usize) -> Self {
        Self {
            queue: BTreeMap::new(),
            pool: Vec::new(),
            pool_limit,
        }
    }

    /// True when no expiry is scheduled
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of distinct expiry times scheduled
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Earliest scheduled expiry time
    pub fn try_get_first(&self) -> Option<i64> {
        self.queue.keys().next().copied()
    }

    /// Remove and return the bucket scheduled at `time`
    pub fn remove(&mut self, time: i64) -> Option<ChangeBucket<K, S>> {
        self.queue.remove(&time)
    }

    /// Remove the earliest bucket if it is due at or before `time`
    pub fn pop_due(&mut self, time: i64) -> Option<(i64, ChangeBucket<K, S>)> {
        match self.try_get_first() {
            Some(first) if first <= time => self.queue.pop_first(),
            _ => None,
        }
    }

    /// Hand a drained bucket back for reuse
    pub fn recycle(&mut self, mut bucket: ChangeBucket<K, S>) {
        if self.pool.len() < self.pool_limit {
            bucket.index.clear();
            bucket.entries.clear();
            self.pool.push(bucket);
        }
    }

    /// Number of idle buckets held for reuse
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    /// Remove every scheduled delta, yielding the states for disposal
    pub fn drain_states(&mut self) -> impl Iterator<Item = S> + '_ {
        std::mem::take(&mut self.queue)
            .into_values()
            .flat_map(|mut bucket| bucket.drain().map(|(_, _, delta)| delta.state).collect::<Vec<_>>())
    }
}

impl<K: Eq + Hash + Clone, S> ExpiredChangeQueue<K, S> {
    /// Delta for `key` at `time`, created from `init` if absent.
    ///
    /// The caller folds its contribution into the returned delta and bumps
    /// `active`.
    pub fn entry(
        &mut self,
        time: i64,
        key: &K,
        hash: u32,
        init: impl FnOnce() -> S,
    ) -> &mut StateAndActive<S> {
        let pool = &mut self.pool;
        self.queue
            .entry(time)
            .or_insert_with(|| pool.pop().unwrap_or_default())
            .entry(key, hash, init)
    }

    /// Fold one contribution for `key` expiring at `time`
    pub fn merge(
        &mut self,
        time: i64,
        key: &K,
        hash: u32,
        init: impl FnOnce() -> S,
        fold: impl FnOnce(&mut S),
    ) {
        let delta = self.entry(time, key, hash, init);
        fold(&mut delta.state);
        delta.active += 1;
    }
}
