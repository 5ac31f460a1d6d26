//! Watermark generation for ingress
//!
//! The pipes never infer progress on their own: time advances only through
//! data rows, punctuations and low watermarks. The generators here help an
//! ingress decide when to inject those control rows, based on the event
//! timestamps it has seen.
//!
//! # Example
//!
//! ```rust
//! use temporal_processor::watermark::{BoundedOutOfOrdernessWatermark, WatermarkGenerator};
//!
//! // Tolerate events up to 100 ticks late
//! let mut generator = BoundedOutOfOrdernessWatermark::new(100);
//!
//! assert_eq!(generator.on_event(1_000, 0).map(|w| w.timestamp), Some(900));
//! assert_eq!(generator.on_event(950, 0), None);
//! ```

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use temporal_types::time::{floor_div, INFINITY_SYNC_TIME};
use temporal_types::StreamEvent;
use tracing::{debug, trace};

/// Progress marker: no event with a timestamp below it is expected anymore
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Watermark {
    /// Watermark time in ticks
    pub timestamp: i64,
}

impl Watermark {
    pub fn new(timestamp: i64) -> Self {
        Self { timestamp }
    }

    /// The minimum watermark (nothing known yet)
    pub fn min() -> Self {
        Self { timestamp: i64::MIN }
    }

    /// The maximum watermark (stream complete)
    pub fn max() -> Self {
        Self {
            timestamp: INFINITY_SYNC_TIME,
        }
    }

    pub fn is_min(&self) -> bool {
        self.timestamp == i64::MIN
    }

    pub fn is_max(&self) -> bool {
        self.timestamp == INFINITY_SYNC_TIME
    }

    /// Whether an event at `timestamp` arrives behind this watermark
    pub fn is_late(&self, timestamp: i64) -> bool {
        timestamp < self.timestamp
    }

    /// Low-watermark row carrying this watermark
    pub fn to_low_watermark<K: Default, P: Default>(&self) -> StreamEvent<K, P> {
        StreamEvent::low_watermark(self.timestamp)
    }

    /// Punctuation row for the scope of `key`
    pub fn to_punctuation<K, P: Default>(&self, key: K) -> StreamEvent<K, P> {
        StreamEvent::keyed_punctuation(self.timestamp, key)
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::min()
    }
}

/// Renders the timestamp as a UTC instant, reading ticks as milliseconds
impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_min() {
            return write!(f, "Watermark(-inf)");
        }
        if self.is_max() {
            return write!(f, "Watermark(+inf)");
        }
        match DateTime::from_timestamp_millis(self.timestamp) {
            Some(dt) => write!(f, "Watermark({})", dt.to_rfc3339()),
            None => write!(f, "Watermark({} ticks)", self.timestamp),
        }
    }
}

/// Trait for generating watermarks from event timestamps
pub trait WatermarkGenerator: Send {
    /// Observe an event; returns the new watermark if it advanced
    fn on_event(&mut self, timestamp: i64, partition: u32) -> Option<Watermark>;

    /// Gets the current watermark without advancing it
    fn current_watermark(&self) -> Watermark;

    /// Resets the generator to its initial state
    fn reset(&mut self);

    /// Gets the watermark of a single partition
    fn partition_watermark(&self, partition: u32) -> Option<Watermark>;
}

/// Configuration for bounded out-of-orderness watermarking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedOutOfOrdernessConfig {
    /// Maximum lateness in ticks tolerated behind the newest timestamp
    pub max_out_of_orderness: i64,
}

impl Default for BoundedOutOfOrdernessConfig {
    fn default() -> Self {
        Self {
            max_out_of_orderness: 0,
        }
    }
}

/// Watermark trailing the newest timestamp by a fixed delay
///
/// Each partition tracks its own newest timestamp. The global watermark is
/// the minimum over the partition watermarks and never moves backwards.
#[derive(Debug, Clone)]
pub struct BoundedOutOfOrdernessWatermark {
    config: BoundedOutOfOrdernessConfig,
    partition_max_timestamps: HashMap<u32, i64>,
    current_watermark: Watermark,
}

impl BoundedOutOfOrdernessWatermark {
    pub fn new(max_out_of_orderness: i64) -> Self {
        Self::with_config(BoundedOutOfOrdernessConfig {
            max_out_of_orderness,
        })
    }

    pub fn with_config(config: BoundedOutOfOrdernessConfig) -> Self {
        Self {
            config,
            partition_max_timestamps: HashMap::new(),
            current_watermark: Watermark::min(),
        }
    }

    /// Stop waiting for `partition`; returns the new watermark if it advanced
    pub fn remove_partition(&mut self, partition: u32) -> Option<Watermark> {
        self.partition_max_timestamps.remove(&partition)?;
        self.advance()
    }

    /// Number of partitions contributing to the watermark
    pub fn partition_count(&self) -> usize {
        self.partition_max_timestamps.len()
    }

    fn compute(&self, max_timestamp: i64) -> Watermark {
        Watermark::new(max_timestamp.saturating_sub(self.config.max_out_of_orderness))
    }

    fn advance(&mut self) -> Option<Watermark> {
        let merged = self
            .partition_max_timestamps
            .values()
            .min()
            .map(|max_ts| self.compute(*max_ts))?;

        if merged > self.current_watermark {
            self.current_watermark = merged;
            debug!(watermark = %merged, "Advanced watermark");
            Some(merged)
        } else {
            None
        }
    }
}

impl WatermarkGenerator for BoundedOutOfOrdernessWatermark {
    fn on_event(&mut self, timestamp: i64, partition: u32) -> Option<Watermark> {
        trace!(timestamp, partition, "Processing event for watermark");
        self.partition_max_timestamps
            .entry(partition)
            .and_modify(|max_ts| *max_ts = (*max_ts).max(timestamp))
            .or_insert(timestamp);
        self.advance()
    }

    fn current_watermark(&self) -> Watermark {
        self.current_watermark
    }

    fn reset(&mut self) {
        self.partition_max_timestamps.clear();
        self.current_watermark = Watermark::min();
        debug!("Watermark generator reset");
    }

    fn partition_watermark(&self, partition: u32) -> Option<Watermark> {
        self.partition_max_timestamps
            .get(&partition)
            .map(|max_ts| self.compute(*max_ts))
    }
}

type Extractor = Box<dyn FnMut(i64, u32) -> Option<i64> + Send>;

/// Watermark driven by markers in the event stream
///
/// The extractor inspects each event and returns a watermark time when the
/// event should advance the watermark.
pub struct PunctuatedWatermark {
    extractor: Extractor,
    current_watermark: Watermark,
    partition_watermarks: HashMap<u32, Watermark>,
}

impl PunctuatedWatermark {
    pub fn new<F>(extractor: F) -> Self
    where
        F: FnMut(i64, u32) -> Option<i64> + Send + 'static,
    {
        Self {
            extractor: Box::new(extractor),
            current_watermark: Watermark::min(),
            partition_watermarks: HashMap::new(),
        }
    }

    /// Emit a watermark each time timestamps cross into a new multiple of
    /// `interval` (aligned at zero)
    pub fn on_timestamp_boundary(interval: i64) -> Self {
        let interval = interval.max(1);
        let mut last_boundary = i64::MIN;
        Self::new(move |timestamp, _partition| {
            let boundary = floor_div(timestamp, interval).saturating_mul(interval);
            if boundary > last_boundary {
                last_boundary = boundary;
                Some(boundary)
            } else {
                None
            }
        })
    }

    /// Emit a watermark at every `n`-th event
    pub fn every_n_events(n: u64) -> Self {
        let n = n.max(1);
        let mut count = 0u64;
        Self::new(move |timestamp, _partition| {
            count += 1;
            (count % n == 0).then_some(timestamp)
        })
    }
}

impl std::fmt::Debug for PunctuatedWatermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PunctuatedWatermark")
            .field("current_watermark", &self.current_watermark)
            .field("partitions", &self.partition_watermarks.len())
            .finish()
    }
}

impl WatermarkGenerator for PunctuatedWatermark {
    fn on_event(&mut self, timestamp: i64, partition: u32) -> Option<Watermark> {
        let watermark = Watermark::new((self.extractor)(timestamp, partition)?);
        self.partition_watermarks.insert(partition, watermark);

        if watermark > self.current_watermark {
            self.current_watermark = watermark;
            debug!(watermark = %watermark, partition, "Punctuated watermark emission");
            return Some(watermark);
        }
        None
    }

    fn current_watermark(&self) -> Watermark {
        self.current_watermark
    }

    fn reset(&mut self) {
        self.current_watermark = Watermark::min();
        self.partition_watermarks.clear();
    }

    fn partition_watermark(&self, partition: u32) -> Option<Watermark> {
        self.partition_watermarks.get(&partition).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use temporal_types::time::LOW_WATERMARK_OTHER_TIME;
    use temporal_types::EventKind;

    #[test]
    fn test_watermark_display() {
        assert_eq!(Watermark::min().to_string(), "Watermark(-inf)");
        assert_eq!(Watermark::max().to_string(), "Watermark(+inf)");
        assert_eq!(
            Watermark::new(0).to_string(),
            "Watermark(1970-01-01T00:00:00+00:00)"
        );
    }

    #[test]
    fn test_watermark_rows() {
        let row: StreamEvent<u32, i64> = Watermark::new(40).to_low_watermark();
        assert_eq!(row.kind(), EventKind::LowWatermark);
        assert_eq!((row.sync_time, row.other_time), (40, LOW_WATERMARK_OTHER_TIME));

        let row: StreamEvent<&str, i64> = Watermark::new(40).to_punctuation("a");
        assert_eq!(row.kind(), EventKind::Punctuation);
        assert_eq!(row.key, "a");
    }

    #[test]
    fn test_bounded_watermark_never_regresses() {
        let mut generator = BoundedOutOfOrdernessWatermark::new(10);
        assert_eq!(generator.on_event(100, 0), Some(Watermark::new(90)));
        assert_eq!(generator.on_event(95, 0), None);
        assert_eq!(generator.on_event(120, 0), Some(Watermark::new(110)));
        assert_eq!(generator.current_watermark(), Watermark::new(110));
        assert!(generator.current_watermark().is_late(105));
    }

    #[test]
    fn test_bounded_watermark_waits_for_slowest_partition() {
        let mut generator = BoundedOutOfOrdernessWatermark::new(0);
        generator.on_event(100, 0);
        assert_eq!(generator.on_event(500, 1), None);
        assert_eq!(generator.current_watermark(), Watermark::new(100));
        assert_eq!(generator.partition_watermark(1), Some(Watermark::new(500)));

        assert_eq!(generator.on_event(300, 0), Some(Watermark::new(300)));
        assert_eq!(generator.remove_partition(0), Some(Watermark::new(500)));
        assert_eq!(generator.partition_count(), 1);

        generator.reset();
        assert!(generator.current_watermark().is_min());
    }

    #[test]
    fn test_punctuated_boundary() {
        let mut generator = PunctuatedWatermark::on_timestamp_boundary(100);
        assert_eq!(generator.on_event(-30, 0), Some(Watermark::new(-100)));
        assert_eq!(generator.on_event(50, 0), Some(Watermark::new(0)));
        assert_eq!(generator.on_event(99, 0), None);
        assert_eq!(generator.on_event(250, 2), Some(Watermark::new(200)));
        assert_eq!(generator.partition_watermark(2), Some(Watermark::new(200)));
    }

    #[test]
    fn test_punctuated_every_n() {
        let mut generator = PunctuatedWatermark::every_n_events(3);
        assert_eq!(generator.on_event(1, 0), None);
        assert_eq!(generator.on_event(2, 0), None);
        assert_eq!(generator.on_event(3, 0), Some(Watermark::new(3)));
        generator.reset();
        assert!(generator.current_watermark().is_min());
    }
}
