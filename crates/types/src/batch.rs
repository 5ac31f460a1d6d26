//! Columnar event batches
//!
//! A [`StreamMessage`] stores a batch of events as parallel column arrays plus a
//! bit vector. A set bit marks a slot that is not ordinary data: either a
//! control row (punctuation or low watermark, told apart by the sentinel in
//! `other_time`) or a deleted slot that downstream operators must skip.
//!
//! Row shapes are encoded purely by the two timestamps:
//!
//! ```text
//! sync < other == INFINITY   start edge     [sync, +inf)
//! sync < other <  INFINITY   interval       [sync, other)
//! other <= sync              end edge       closes [other, ...) at sync
//! ```

use crate::errors::{Result, TypesError};
use crate::key::hash_key;
use crate::time::{
    INFINITY_SYNC_TIME, LOW_WATERMARK_OTHER_TIME, MAX_SYNC_TIME, MIN_SYNC_TIME,
    PUNCTUATION_OTHER_TIME,
};
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Classification of a single batch slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Opens an unbounded lifetime
    StartEdge,
    /// Closes a lifetime previously opened by a start edge
    EndEdge,
    /// A complete lifetime `[start, end)`
    Interval,
    /// Time will not go below this point for the row's key scope
    Punctuation,
    /// Time will not go below this point for any partition
    LowWatermark,
    /// Slot removed by an upstream operator
    Deleted,
}

impl EventKind {
    /// True for punctuation and low-watermark rows
    pub fn is_control(&self) -> bool {
        matches!(self, EventKind::Punctuation | EventKind::LowWatermark)
    }

    /// True for rows that carry a payload
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            EventKind::StartEdge | EventKind::EndEdge | EventKind::Interval
        )
    }
}

/// Packed bit vector, one bit per batch slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitVector {
    words: Vec<u64>,
    len: usize,
}

impl BitVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity((bits + 63) >> 6),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one bit
    pub fn push(&mut self, bit: bool) {
        if self.len & 63 == 0 {
            self.words.push(0);
        }
        if bit {
            self.words[self.len >> 6] |= 1u64 << (self.len & 63);
        }
        self.len += 1;
    }

    pub fn get(&self, index: usize) -> bool {
        index < self.len && (self.words[index >> 6] & (1u64 << (index & 63))) != 0
    }

    /// Set bit `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize) {
        assert!(index < self.len, "bit index {} out of bounds", index);
        self.words[index >> 6] |= 1u64 << (index & 63);
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn clear(&mut self) {
        self.words.clear();
        self.len = 0;
    }

    /// Raw words, bit `i & 63` of word `i >> 6` is slot `i`
    pub fn words(&self) -> &[u64] {
        &self.words
    }
}

/// One event in row form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent<K, P> {
    pub sync_time: i64,
    pub other_time: i64,
    pub key: K,
    pub payload: P,
}

impl<K, P> StreamEvent<K, P> {
    /// Start edge `[start, +inf)`
    pub fn start_edge(start: i64, key: K, payload: P) -> Self {
        Self {
            sync_time: start,
            other_time: INFINITY_SYNC_TIME,
            key,
            payload,
        }
    }

    /// End edge at `end` closing the lifetime that began at `start`
    pub fn end_edge(end: i64, start: i64, key: K, payload: P) -> Self {
        Self {
            sync_time: end,
            other_time: start,
            key,
            payload,
        }
    }

    /// Interval `[start, end)`
    pub fn interval(start: i64, end: i64, key: K, payload: P) -> Self {
        Self {
            sync_time: start,
            other_time: end,
            key,
            payload,
        }
    }

    /// Punctuation for the scope identified by `key`
    pub fn keyed_punctuation(time: i64, key: K) -> Self
    where
        P: Default,
    {
        Self {
            sync_time: time,
            other_time: PUNCTUATION_OTHER_TIME,
            key,
            payload: P::default(),
        }
    }

    /// Classify this row
    pub fn kind(&self) -> EventKind {
        classify(self.sync_time, self.other_time, false)
    }
}

impl<K: Default, P: Default> StreamEvent<K, P> {
    /// Punctuation for an ungrouped stream
    pub fn punctuation(time: i64) -> Self {
        Self::keyed_punctuation(time, K::default())
    }

    /// Low watermark covering every partition
    pub fn low_watermark(time: i64) -> Self {
        Self {
            sync_time: time,
            other_time: LOW_WATERMARK_OTHER_TIME,
            key: K::default(),
            payload: P::default(),
        }
    }
}

fn classify(sync_time: i64, other_time: i64, flagged: bool) -> EventKind {
    match other_time {
        PUNCTUATION_OTHER_TIME => EventKind::Punctuation,
        LOW_WATERMARK_OTHER_TIME => EventKind::LowWatermark,
        _ if flagged => EventKind::Deleted,
        INFINITY_SYNC_TIME if sync_time < other_time => EventKind::StartEdge,
        _ if sync_time < other_time => EventKind::Interval,
        _ => EventKind::EndEdge,
    }
}

/// A batch of events stored column-wise
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage<K, P> {
    pub sync_time: Vec<i64>,
    pub other_time: Vec<i64>,
    pub key: Vec<K>,
    pub hash: Vec<u32>,
    pub payload: Vec<P>,
    pub bitvector: BitVector,
}

impl<K, P> Default for StreamMessage<K, P> {
    fn default() -> Self {
        Self {
            sync_time: Vec::new(),
            other_time: Vec::new(),
            key: Vec::new(),
            hash: Vec::new(),
            payload: Vec::new(),
            bitvector: BitVector::new(),
        }
    }
}

impl<K, P> StreamMessage<K, P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sync_time: Vec::with_capacity(capacity),
            other_time: Vec::with_capacity(capacity),
            key: Vec::with_capacity(capacity),
            hash: Vec::with_capacity(capacity),
            payload: Vec::with_capacity(capacity),
            bitvector: BitVector::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.sync_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sync_time.is_empty()
    }

    /// True once the batch holds at least `limit` slots
    pub fn is_full(&self, limit: usize) -> bool {
        self.len() >= limit
    }

    /// Append a slot with every column given explicitly
    pub fn push_raw(
        &mut self,
        sync_time: i64,
        other_time: i64,
        key: K,
        hash: u32,
        payload: P,
        control: bool,
    ) -> usize {
        let index = self.len();
        self.sync_time.push(sync_time);
        self.other_time.push(other_time);
        self.key.push(key);
        self.hash.push(hash);
        self.payload.push(payload);
        self.bitvector.push(control);
        index
    }

    /// True when slot `index` is a control row or a deleted slot
    pub fn is_control(&self, index: usize) -> bool {
        self.bitvector.get(index)
    }

    /// Classify slot `index`
    pub fn kind(&self, index: usize) -> EventKind {
        classify(
            self.sync_time[index],
            self.other_time[index],
            self.bitvector.get(index),
        )
    }

    /// Remove slot `index` from downstream view
    pub fn mark_deleted(&mut self, index: usize) {
        self.bitvector.set(index);
    }

    /// Number of slots that are neither control rows nor deleted
    pub fn live_count(&self) -> usize {
        self.len() - self.bitvector.count_ones()
    }

    pub fn clear(&mut self) {
        self.sync_time.clear();
        self.other_time.clear();
        self.key.clear();
        self.hash.clear();
        self.payload.clear();
        self.bitvector.clear();
    }
}

impl<K: Clone, P: Clone> StreamMessage<K, P> {
    /// Row view of slot `index`, `None` for deleted slots
    pub fn event(&self, index: usize) -> Option<StreamEvent<K, P>> {
        if self.kind(index) == EventKind::Deleted {
            return None;
        }
        Some(StreamEvent {
            sync_time: self.sync_time[index],
            other_time: self.other_time[index],
            key: self.key[index].clone(),
            payload: self.payload[index].clone(),
        })
    }

    /// Iterate over every non-deleted slot in row form
    pub fn iter(&self) -> impl Iterator<Item = StreamEvent<K, P>> + '_ {
        (0..self.len()).filter_map(move |i| self.event(i))
    }
}

impl<K: Hash, P> StreamMessage<K, P> {
    /// Append a data or control row, deriving the hash and control bit
    pub fn push_event(&mut self, sync_time: i64, other_time: i64, key: K, payload: P) -> usize {
        let hash = hash_key(&key);
        let control = other_time == PUNCTUATION_OTHER_TIME || other_time == LOW_WATERMARK_OTHER_TIME;
        self.push_raw(sync_time, other_time, key, hash, payload, control)
    }

    pub fn push(&mut self, event: StreamEvent<K, P>) -> usize {
        self.push_event(event.sync_time, event.other_time, event.key, event.payload)
    }

    pub fn push_start_edge(&mut self, start: i64, key: K, payload: P) -> usize {
        self.push_event(start, INFINITY_SYNC_TIME, key, payload)
    }

    pub fn push_end_edge(&mut self, end: i64, start: i64, key: K, payload: P) -> usize {
        debug_assert!(start < end, "empty lifetime [{}, {})", start, end);
        self.push_event(end, start, key, payload)
    }

    pub fn push_interval(&mut self, start: i64, end: i64, key: K, payload: P) -> usize {
        debug_assert!(start < end, "empty lifetime [{}, {})", start, end);
        self.push_event(start, end, key, payload)
    }

    /// Append a punctuation for the scope of `key`
    pub fn push_punctuation(&mut self, time: i64, key: K) -> usize
    where
        P: Default,
    {
        self.push_event(time, PUNCTUATION_OTHER_TIME, key, P::default())
    }

    /// Append a low watermark
    pub fn push_low_watermark(&mut self, time: i64) -> usize
    where
        K: Default,
        P: Default,
    {
        self.push_event(time, LOW_WATERMARK_OTHER_TIME, K::default(), P::default())
    }
}

impl<K: Hash + Clone, P: Clone> StreamMessage<K, P> {
    /// Build a batch from `events[offset..offset + count]`.
    ///
    /// The segment bounds and every event's timestamps are validated before
    /// anything is copied, so a rejected segment leaves no partial batch.
    pub fn from_segment(events: &[StreamEvent<K, P>], offset: usize, count: usize) -> Result<Self> {
        let end = offset
            .checked_add(count)
            .filter(|end| *end <= events.len())
            .ok_or(TypesError::MalformedSegment {
                offset,
                count,
                len: events.len(),
            })?;

        let segment = &events[offset..end];
        for event in segment {
            validate_event(event.sync_time, event.other_time)?;
        }

        let mut batch = Self::with_capacity(count);
        for event in segment {
            batch.push(event.clone());
        }
        Ok(batch)
    }

    /// Build a batch from a full slice of events
    pub fn from_events(events: &[StreamEvent<K, P>]) -> Result<Self> {
        Self::from_segment(events, 0, events.len())
    }
}

fn validate_event(sync_time: i64, other_time: i64) -> Result<()> {
    let kind = classify(sync_time, other_time, false);
    let sync_ok = if kind.is_control() {
        sync_time >= MIN_SYNC_TIME
    } else {
        (MIN_SYNC_TIME..=MAX_SYNC_TIME).contains(&sync_time)
    };
    if !sync_ok {
        return Err(TypesError::InvalidEvent {
            sync_time,
            other_time,
            reason: "sync time outside the representable range".to_string(),
        });
    }
    if kind == EventKind::EndEdge {
        if other_time < MIN_SYNC_TIME {
            return Err(TypesError::InvalidEvent {
                sync_time,
                other_time,
                reason: "end edge start time outside the representable range".to_string(),
            });
        }
        // `[t, t)` classifies as an end edge but has no lifetime
        if other_time >= sync_time {
            return Err(TypesError::InvalidEvent {
                sync_time,
                other_time,
                reason: "zero-length lifetime".to_string(),
            });
        }
    }
    Ok(())
}
