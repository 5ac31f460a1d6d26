use super::alter::{apply_rewrite, DurationSelector, LifetimeAlteration, Rewrite, StartSelector};
use crate::error::{ProcessorError, Result};
use crate::pipeline::{PipeStats, StreamObserver};
use std::collections::HashMap;
use std::fmt::Debug;
use temporal_types::{EventKind, PartitionedKey, StreamMessage};
use tracing::debug;

/// Rewrites event lifetimes of a partitioned stream
///
/// Monotonicity is enforced per partition. The low watermark acts as a floor
/// for every partition, so a partition whose last output time the watermark
/// has passed carries no information and is dropped.
pub struct PartitionedAlterLifetimePipe<K: PartitionedKey, P, O> {
    alteration: LifetimeAlteration,
    observer: O,
    last_times: HashMap<K::Partition, i64>,
    low_watermark: i64,
    stats: PipeStats,
    _marker: std::marker::PhantomData<fn(P)>,
}

impl<K, P, O> PartitionedAlterLifetimePipe<K, P, O>
where
    K: PartitionedKey,
    O: StreamObserver<K, P>,
{
    pub fn new(start: Option<StartSelector>, duration: DurationSelector, observer: O) -> Self {
        Self {
            alteration: LifetimeAlteration::new(start, duration),
            observer,
            last_times: HashMap::new(),
            low_watermark: i64::MIN,
            stats: PipeStats::new(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn stats(&self) -> &PipeStats {
        &self.stats
    }

    /// Number of partitions with an output floor above the low watermark
    pub fn partition_count(&self) -> usize {
        self.last_times.len()
    }

    pub fn low_watermark(&self) -> i64 {
        self.low_watermark
    }

    /// Ordering floor of `partition`
    pub fn floor(&self, partition: &K::Partition) -> i64 {
        self.last_times
            .get(partition)
            .copied()
            .unwrap_or(i64::MIN)
            .max(self.low_watermark)
    }

    fn on_low_watermark(&mut self, time: i64) -> i64 {
        let time = self.alteration.remap(time).max(self.low_watermark);
        self.low_watermark = time;
        let before = self.last_times.len();
        self.last_times.retain(|_, last| *last > time);
        let collected = before - self.last_times.len();
        if collected > 0 {
            debug!(collected, low_watermark = time, "Dropped passed partitions");
            self.stats.partitions_collected += collected as u64;
        }
        self.stats.low_watermarks += 1;
        time
    }
}

impl<K, P, O> StreamObserver<K, P> for PartitionedAlterLifetimePipe<K, P, O>
where
    K: PartitionedKey,
    P: Debug,
    O: StreamObserver<K, P>,
{
    fn on_next(&mut self, mut batch: StreamMessage<K, P>) -> Result<()> {
        for i in 0..batch.len() {
            let kind = batch.kind(i);
            match kind {
                EventKind::Deleted => {}
                EventKind::LowWatermark => {
                    batch.sync_time[i] = self.on_low_watermark(batch.sync_time[i]);
                }
                EventKind::Punctuation => {
                    let partition = batch.key[i].partition();
                    let time = self
                        .alteration
                        .remap(batch.sync_time[i])
                        .max(self.floor(partition));
                    self.last_times.insert(partition.clone(), time);
                    batch.sync_time[i] = time;
                    self.stats.punctuations += 1;
                }
                _ => {
                    self.stats.rows_in += 1;
                    let rewrite = self
                        .alteration
                        .rewrite(kind, batch.sync_time[i], batch.other_time[i])?;
                    if let Rewrite::Keep { start, .. } = rewrite {
                        let partition = batch.key[i].partition();
                        let floor = self.floor(partition);
                        if start < floor {
                            return Err(ProcessorError::out_of_order(
                                partition,
                                floor,
                                start,
                                &batch.payload[i],
                            ));
                        }
                        self.last_times.insert(partition.clone(), start);
                    }
                    apply_rewrite(&mut batch, i, rewrite, &mut self.stats);
                }
            }
        }
        if batch.is_empty() {
            return Ok(());
        }
        self.stats.batches_out += 1;
        self.observer.on_next(batch)
    }

    fn on_flush(&mut self) -> Result<()> {
        self.observer.on_flush()
    }

    fn on_completed(&mut self) -> Result<()> {
        self.observer.on_completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::EventCollector;
    use temporal_types::{PartitionKey, StreamEvent};

    type Key = PartitionKey<u32>;

    fn pipe() -> PartitionedAlterLifetimePipe<Key, i64, EventCollector<Key, i64>> {
        PartitionedAlterLifetimePipe::new(None, DurationSelector::constant(5), EventCollector::new())
    }

    #[test]
    fn test_partitions_are_ordered_independently() {
        let mut pipe = pipe();
        let mut batch = StreamMessage::new();
        batch.push_start_edge(10, PartitionKey(1), 0);
        batch.push_start_edge(3, PartitionKey(2), 0);
        pipe.on_next(batch).unwrap();

        assert_eq!(
            pipe.observer().events(),
            &[
                StreamEvent::interval(10, 15, PartitionKey(1), 0),
                StreamEvent::interval(3, 8, PartitionKey(2), 0),
            ]
        );
        assert_eq!(pipe.floor(&1), 10);
        assert_eq!(pipe.floor(&2), 3);
    }

    #[test]
    fn test_disorder_within_partition_rejected() {
        let mut pipe = pipe();
        let mut batch = StreamMessage::new();
        batch.push_start_edge(10, PartitionKey(1), 0);
        batch.push_start_edge(3, PartitionKey(1), 0);
        let err = pipe.on_next(batch).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::OutOfOrderOutput {
                last_time: 10,
                violating_time: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_low_watermark_floors_and_collects() {
        let mut pipe = pipe();
        let mut batch = StreamMessage::new();
        batch.push_start_edge(10, PartitionKey(1), 0);
        batch.push_start_edge(30, PartitionKey(2), 0);
        batch.push_low_watermark(20);
        pipe.on_next(batch).unwrap();

        assert_eq!(pipe.partition_count(), 1);
        assert_eq!(pipe.floor(&1), 20);
        assert_eq!(pipe.floor(&2), 30);

        let mut batch = StreamMessage::new();
        batch.push_start_edge(15, PartitionKey(3), 0);
        assert!(pipe.on_next(batch).is_err());
    }

    #[test]
    fn test_punctuation_floored_per_partition() {
        let mut pipe = pipe();
        let mut batch = StreamMessage::new();
        batch.push_start_edge(10, PartitionKey(1), 0);
        batch.push_punctuation(4, PartitionKey(1));
        batch.push_punctuation(4, PartitionKey(2));
        pipe.on_next(batch).unwrap();

        let events = pipe.observer().events();
        assert_eq!(events[1].sync_time, 10);
        assert_eq!(events[2].sync_time, 4);
    }
}
