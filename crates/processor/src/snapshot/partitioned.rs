use super::timeline::{emit_low_watermark, SnapshotCore, Timeline};
use crate::aggregation::SnapshotAggregate;
use crate::config::PipeConfig;
use crate::error::Result;
use crate::pipeline::{PipeStats, StreamObserver};
use std::collections::HashMap;
use std::fmt::Debug;
use temporal_types::{EventKind, PartitionedKey, StreamMessage};
use tracing::debug;

/// Per-partition progress of a [`PartitionedSnapshotWindowPipe`]
pub type PartitionEntry<K, S> = Timeline<K, S>;

/// Snapshot aggregation over a partitioned stream
///
/// Each partition advances independently: a punctuation moves only its own
/// partition, while a low watermark moves every partition that is behind it.
/// Output is ordered per partition. Partitions that hold no keys and have no
/// scheduled expiries are dropped when a low watermark passes them.
/// Completion only flushes; a low watermark at `INFINITY_SYNC_TIME` closes
/// every partition.
pub struct PartitionedSnapshotWindowPipe<A: SnapshotAggregate, K: PartitionedKey, O> {
    core: SnapshotCore<A, K, O>,
    partitions: HashMap<K::Partition, PartitionEntry<K, A::State>>,
    low_watermark: i64,
    bucket_pool_size: usize,
}

impl<A, K, O> PartitionedSnapshotWindowPipe<A, K, O>
where
    A: SnapshotAggregate,
    K: PartitionedKey,
    O: StreamObserver<K, A::Output>,
{
    pub fn new(aggregate: A, observer: O, config: &PipeConfig) -> Self {
        Self {
            core: SnapshotCore::new(aggregate, observer, config.batch_size),
            partitions: HashMap::new(),
            low_watermark: i64::MIN,
            bucket_pool_size: config.bucket_pool_size,
        }
    }

    pub fn with_defaults(aggregate: A, observer: O) -> Self {
        Self::new(aggregate, observer, &PipeConfig::default())
    }

    pub fn observer(&self) -> &O {
        self.core.emitter.observer()
    }

    pub fn observer_mut(&mut self) -> &mut O {
        self.core.emitter.observer_mut()
    }

    pub fn stats(&self) -> &PipeStats {
        &self.core.stats
    }

    /// Number of live partitions
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn partition(&self, partition: &K::Partition) -> Option<&PartitionEntry<K, A::State>> {
        self.partitions.get(partition)
    }

    /// Number of keys with held aggregate state, across partitions
    pub fn held_keys(&self) -> usize {
        self.core.store.len()
    }

    /// Highest low watermark seen
    pub fn low_watermark(&self) -> i64 {
        self.low_watermark
    }
}

impl<A: SnapshotAggregate, K: PartitionedKey, O> PartitionedSnapshotWindowPipe<A, K, O> {
    /// Release every held and scheduled aggregate state.
    ///
    /// Safe to call more than once; also runs when the pipe is dropped.
    pub fn dispose_state(&mut self) {
        let before = self.core.stats.states_disposed;
        self.core.dispose_held();
        for entry in self.partitions.values_mut() {
            entry.dispose_scheduled(&self.core.disposal, &mut self.core.stats);
        }
        self.partitions.clear();
        let disposed = self.core.stats.states_disposed - before;
        if disposed > 0 {
            debug!(disposed, "Disposed partitioned snapshot state");
        }
    }
}

impl<A: SnapshotAggregate, K: PartitionedKey, O> Drop for PartitionedSnapshotWindowPipe<A, K, O> {
    fn drop(&mut self) {
        self.dispose_state();
    }
}

impl<A, K, O> PartitionedSnapshotWindowPipe<A, K, O>
where
    A: SnapshotAggregate,
    A::Output: Debug,
    K: PartitionedKey + Debug,
    O: StreamObserver<K, A::Output>,
{
    fn on_low_watermark(&mut self, time: i64, key: &K, hash: u32) -> Result<()> {
        if time <= self.low_watermark {
            return Ok(());
        }
        for (partition, entry) in self.partitions.iter_mut() {
            entry.catch_up(&mut self.core, partition, time)?;
        }
        self.low_watermark = time;

        // Partitions ahead of the watermark keep their ordering floor
        let before = self.partitions.len();
        self.partitions
            .retain(|_, entry| !(entry.is_idle() && entry.last_sync_time() <= time));
        let collected = before - self.partitions.len();
        if collected > 0 {
            debug!(collected, low_watermark = time, "Collected idle partitions");
            self.core.stats.partitions_collected += collected as u64;
        }

        emit_low_watermark(&mut self.core, time, key.clone(), hash)
    }
}

impl<A, K, O> StreamObserver<K, A::Input> for PartitionedSnapshotWindowPipe<A, K, O>
where
    A: SnapshotAggregate,
    A::Output: Debug,
    K: PartitionedKey + Debug,
    O: StreamObserver<K, A::Output>,
{
    fn on_next(&mut self, batch: StreamMessage<K, A::Input>) -> Result<()> {
        let mut saw_control = false;
        for i in 0..batch.len() {
            let key = &batch.key[i];
            let sync_time = batch.sync_time[i];
            let floor = self.low_watermark;
            let pool = self.bucket_pool_size;
            match batch.kind(i) {
                EventKind::Deleted => {}
                EventKind::Punctuation => {
                    saw_control = true;
                    let partition = key.partition();
                    let entry = self
                        .partitions
                        .entry(partition.clone())
                        .or_insert_with(|| Timeline::starting_at(floor, pool));
                    entry.on_punctuation(&mut self.core, partition, sync_time, key, batch.hash[i])?;
                }
                EventKind::LowWatermark => {
                    saw_control = true;
                    self.on_low_watermark(sync_time, key, batch.hash[i])?;
                }
                _ => {
                    let partition = key.partition();
                    let entry = self
                        .partitions
                        .entry(partition.clone())
                        .or_insert_with(|| Timeline::starting_at(floor, pool));
                    entry.on_data(
                        &mut self.core,
                        partition,
                        sync_time,
                        batch.other_time[i],
                        key,
                        batch.hash[i],
                        &batch.payload[i],
                    )?;
                }
            }
        }
        if saw_control {
            self.core.emitter.flush(&mut self.core.stats)?;
        }
        Ok(())
    }

    fn on_flush(&mut self) -> Result<()> {
        self.core.emitter.flush(&mut self.core.stats)?;
        self.core.emitter.observer_mut().on_flush()
    }

    fn on_completed(&mut self) -> Result<()> {
        self.core.emitter.flush(&mut self.core.stats)?;
        self.core.emitter.observer_mut().on_completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::CountAggregate;
    use crate::error::ProcessorError;
    use crate::pipeline::EventCollector;
    use temporal_types::{CompoundGroupKey, StreamEvent};

    type Key = CompoundGroupKey<&'static str, u32>;
    type Pipe = PartitionedSnapshotWindowPipe<CountAggregate<i64>, Key, EventCollector<Key, u64>>;

    fn key(tenant: &'static str, group: u32) -> Key {
        CompoundGroupKey::new(tenant, group)
    }

    fn pipe() -> Pipe {
        PartitionedSnapshotWindowPipe::with_defaults(CountAggregate::new(), EventCollector::new())
    }

    #[test]
    fn test_punctuation_advances_only_its_partition() {
        let mut pipe = pipe();
        let mut batch = StreamMessage::new();
        batch.push_interval(0, 10, key("a", 1), 1);
        batch.push_interval(5, 8, key("b", 1), 1);
        batch.push_punctuation(20, key("a", 0));
        pipe.on_next(batch).unwrap();

        assert_eq!(
            pipe.observer().events(),
            &[
                StreamEvent::start_edge(0, key("a", 1), 1),
                StreamEvent::end_edge(10, 0, key("a", 1), 1),
                StreamEvent::keyed_punctuation(20, key("a", 0)),
            ]
        );
        assert_eq!(pipe.partition_count(), 2);
        assert_eq!(pipe.partition(&"a").unwrap().last_sync_time(), 20);
        assert_eq!(pipe.partition(&"b").unwrap().key_count(), 1);
    }

    #[test]
    fn test_low_watermark_advances_and_collects() {
        let mut pipe = pipe();
        let mut batch = StreamMessage::new();
        batch.push_interval(0, 10, key("a", 1), 1);
        batch.push_interval(5, 8, key("b", 1), 1);
        batch.push_punctuation(20, key("a", 0));
        batch.push_low_watermark(20);
        pipe.on_next(batch).unwrap();

        let b_events: Vec<_> = pipe
            .observer()
            .events()
            .iter()
            .filter(|e| e.key.partition == "b" && e.kind().is_data())
            .cloned()
            .collect();
        assert_eq!(
            b_events,
            vec![
                StreamEvent::start_edge(5, key("b", 1), 1),
                StreamEvent::end_edge(8, 5, key("b", 1), 1),
            ]
        );
        assert_eq!(
            pipe.observer().events().last().map(|e| e.kind()),
            Some(EventKind::LowWatermark)
        );
        assert_eq!(pipe.partition_count(), 0);
        assert_eq!(pipe.held_keys(), 0);
        assert_eq!(pipe.stats().partitions_collected, 2);
    }

    #[test]
    fn test_partition_with_live_keys_survives_collection() {
        let mut pipe = pipe();
        let mut batch = StreamMessage::new();
        batch.push_start_edge(0, key("a", 1), 1);
        batch.push_interval(1, 3, key("b", 1), 1);
        batch.push_low_watermark(10);
        pipe.on_next(batch).unwrap();

        assert_eq!(pipe.partition_count(), 1);
        assert!(pipe.partition(&"a").is_some());
        assert_eq!(pipe.low_watermark(), 10);
    }

    #[test]
    fn test_partitions_order_independently() {
        let mut pipe = pipe();
        let mut batch = StreamMessage::new();
        batch.push_interval(10, 12, key("a", 1), 1);
        batch.push_interval(5, 7, key("b", 1), 1);
        batch.push_interval(6, 9, key("b", 2), 1);
        pipe.on_next(batch).unwrap();
        assert_eq!(pipe.held_keys(), 3);
    }

    #[test]
    fn test_data_behind_low_watermark_rejected() {
        let mut pipe = pipe();
        let mut batch = StreamMessage::new();
        batch.push_low_watermark(20);
        batch.push_interval(10, 30, key("c", 1), 1);
        let err = pipe.on_next(batch).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::OutOfOrderOutput {
                last_time: 20,
                violating_time: 10,
                ..
            }
        ));
    }

    #[test]
    fn test_stale_low_watermark_ignored() {
        let mut pipe = pipe();
        let mut batch = StreamMessage::new();
        batch.push_low_watermark(20);
        batch.push_low_watermark(15);
        pipe.on_next(batch).unwrap();
        assert_eq!(pipe.stats().low_watermarks, 1);
        assert_eq!(pipe.low_watermark(), 20);
    }
}
