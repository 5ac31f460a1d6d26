use super::timeline::{emit_low_watermark, SnapshotCore, Timeline};
use crate::aggregation::SnapshotAggregate;
use crate::config::PipeConfig;
use crate::error::Result;
use crate::pipeline::{PipeStats, StreamObserver};
use std::fmt::Debug;
use std::hash::Hash;
use temporal_types::{EventKind, StreamMessage};
use tracing::debug;

/// Scope name reported in ordering errors of the non-partitioned pipe
const GLOBAL_SCOPE: &str = "global";

/// Snapshot aggregation over a non-partitioned stream
///
/// Consumes start edges, end edges and intervals keyed by group and emits,
/// per key, the aggregate over the events alive at each point in time as a
/// chain of start/end edge pairs. A result is published only once its tick is
/// closed by a later event, punctuation or low watermark.
///
/// [`StreamObserver::on_completed`] only flushes. End edges due after the last
/// punctuation are emitted once a punctuation at `INFINITY_SYNC_TIME` arrives.
///
/// # Example
///
/// ```rust
/// use temporal_processor::aggregation::CountAggregate;
/// use temporal_processor::pipeline::{EventCollector, StreamObserver};
/// use temporal_processor::snapshot::SnapshotWindowPipe;
/// use temporal_types::StreamMessage;
///
/// let mut pipe = SnapshotWindowPipe::with_defaults(
///     CountAggregate::<i64>::new(),
///     EventCollector::new().data_only(),
/// );
///
/// let mut batch = StreamMessage::new();
/// batch.push_interval(0, 10, "a", 1);
/// batch.push_punctuation(20, "a");
/// pipe.on_next(batch).unwrap();
///
/// // start edge at 0 with count 1, end edge at 10
/// assert_eq!(pipe.observer().events().len(), 2);
/// ```
pub struct SnapshotWindowPipe<A: SnapshotAggregate, K, O> {
    core: SnapshotCore<A, K, O>,
    timeline: Timeline<K, A::State>,
    low_watermark: i64,
}

impl<A, K, O> SnapshotWindowPipe<A, K, O>
where
    A: SnapshotAggregate,
    O: StreamObserver<K, A::Output>,
{
    pub fn new(aggregate: A, observer: O, config: &PipeConfig) -> Self {
        Self {
            core: SnapshotCore::new(aggregate, observer, config.batch_size),
            timeline: Timeline::starting_at(i64::MIN, config.bucket_pool_size),
            low_watermark: i64::MIN,
        }
    }

    /// Pipe with the default [`PipeConfig`]
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

    /// Number of keys with held aggregate state
    pub fn held_keys(&self) -> usize {
        self.core.store.len()
    }

    /// Latest sync time the pipe has advanced to
    pub fn last_sync_time(&self) -> i64 {
        self.timeline.last_sync_time()
    }

    /// Number of distinct expiry times still scheduled
    pub fn scheduled_expiries(&self) -> usize {
        self.timeline.scheduled_expiries()
    }
}

impl<A: SnapshotAggregate, K, O> SnapshotWindowPipe<A, K, O> {
    /// Release every held and scheduled aggregate state.
    ///
    /// Safe to call more than once; also runs when the pipe is dropped.
    pub fn dispose_state(&mut self) {
        let before = self.core.stats.states_disposed;
        self.core.dispose_held();
        self.timeline
            .dispose_scheduled(&self.core.disposal, &mut self.core.stats);
        let disposed = self.core.stats.states_disposed - before;
        if disposed > 0 {
            debug!(disposed, "Disposed snapshot state");
        }
    }
}

impl<A: SnapshotAggregate, K, O> Drop for SnapshotWindowPipe<A, K, O> {
    fn drop(&mut self) {
        self.dispose_state();
    }
}

impl<A, K, O> StreamObserver<K, A::Input> for SnapshotWindowPipe<A, K, O>
where
    A: SnapshotAggregate,
    A::Output: Debug,
    K: Eq + Hash + Clone + Debug,
    O: StreamObserver<K, A::Output>,
{
    fn on_next(&mut self, batch: StreamMessage<K, A::Input>) -> Result<()> {
        let mut saw_control = false;
        for i in 0..batch.len() {
            let sync_time = batch.sync_time[i];
            match batch.kind(i) {
                EventKind::Deleted => {}
                EventKind::Punctuation => {
                    saw_control = true;
                    self.timeline.on_punctuation(
                        &mut self.core,
                        &GLOBAL_SCOPE,
                        sync_time,
                        &batch.key[i],
                        batch.hash[i],
                    )?;
                }
                EventKind::LowWatermark => {
                    saw_control = true;
                    if sync_time > self.low_watermark {
                        self.timeline
                            .catch_up(&mut self.core, &GLOBAL_SCOPE, sync_time)?;
                        self.low_watermark = sync_time;
                        emit_low_watermark(
                            &mut self.core,
                            sync_time,
                            batch.key[i].clone(),
                            batch.hash[i],
                        )?;
                    }
                }
                _ => {
                    self.timeline.on_data(
                        &mut self.core,
                        &GLOBAL_SCOPE,
                        sync_time,
                        batch.other_time[i],
                        &batch.key[i],
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
    use crate::aggregation::{CountAggregate, FnAggregate, SumAggregate};
    use crate::error::ProcessorError;
    use crate::pipeline::EventCollector;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use temporal_types::time::INFINITY_SYNC_TIME;
    use temporal_types::StreamEvent;

    type Collector = EventCollector<&'static str, u64>;

    fn count_pipe() -> SnapshotWindowPipe<CountAggregate<i64>, &'static str, Collector> {
        SnapshotWindowPipe::with_defaults(CountAggregate::new(), EventCollector::new())
    }

    #[test]
    fn test_overlapping_intervals_single_key() {
        let mut pipe = count_pipe();
        let mut batch = StreamMessage::new();
        batch.push_interval(0, 10, "A", 1);
        batch.push_interval(5, 15, "A", 1);
        batch.push_punctuation(20, "A");
        pipe.on_next(batch).unwrap();

        let expected = vec![
            StreamEvent::start_edge(0, "A", 1),
            StreamEvent::end_edge(5, 0, "A", 1),
            StreamEvent::start_edge(5, "A", 2),
            StreamEvent::end_edge(10, 5, "A", 2),
            StreamEvent::start_edge(10, "A", 1),
            StreamEvent::end_edge(15, 10, "A", 1),
            StreamEvent::keyed_punctuation(20, "A"),
        ];
        assert_eq!(pipe.observer().events(), expected.as_slice());
        assert_eq!(pipe.held_keys(), 0);
        assert_eq!(pipe.scheduled_expiries(), 0);
        assert_eq!(pipe.stats().keys_evicted, 1);
    }

    #[test]
    fn test_start_edge_and_retraction() {
        let mut pipe = count_pipe();
        let mut batch = StreamMessage::new();
        batch.push_start_edge(0, "A", 7);
        batch.push_start_edge(3, "A", 8);
        batch.push_end_edge(6, 0, "A", 7);
        batch.push_punctuation(9, "A");
        pipe.on_next(batch).unwrap();

        let events = pipe.observer().events();
        assert_eq!(
            events,
            &[
                StreamEvent::start_edge(0, "A", 1),
                StreamEvent::end_edge(3, 0, "A", 1),
                StreamEvent::start_edge(3, "A", 2),
                StreamEvent::end_edge(6, 3, "A", 2),
                StreamEvent::start_edge(6, "A", 1),
                StreamEvent::keyed_punctuation(9, "A"),
            ]
        );
        assert_eq!(pipe.held_keys(), 1);
    }

    #[test]
    fn test_result_unpublished_until_tick_closes() {
        let mut pipe = count_pipe();
        let mut batch = StreamMessage::new();
        batch.push_interval(0, 10, "A", 1);
        pipe.on_next(batch).unwrap();
        pipe.on_flush().unwrap();
        assert!(pipe.observer().events().is_empty());

        let mut batch = StreamMessage::new();
        batch.push_punctuation(1, "A");
        pipe.on_next(batch).unwrap();
        assert_eq!(pipe.observer().events()[0], StreamEvent::start_edge(0, "A", 1));
    }

    #[test]
    fn test_same_time_changes_merge() {
        let mut pipe = SnapshotWindowPipe::with_defaults(
            SumAggregate::<i64>::new(),
            EventCollector::<&'static str, f64>::new().data_only(),
        );
        let mut batch = StreamMessage::new();
        batch.push_interval(0, 4, "A", 2);
        batch.push_interval(0, 4, "A", 3);
        batch.push_interval(4, 6, "A", 10);
        batch.push_punctuation(10, "A");
        pipe.on_next(batch).unwrap();

        // The expiry at 4 and the new interval at 4 fold into one change
        let events = pipe.observer().events();
        assert_eq!(
            events,
            &[
                StreamEvent::start_edge(0, "A", 5.0),
                StreamEvent::end_edge(4, 0, "A", 5.0),
                StreamEvent::start_edge(4, "A", 10.0),
                StreamEvent::end_edge(6, 4, "A", 10.0),
            ]
        );
    }

    #[test]
    fn test_out_of_order_input_rejected() {
        let mut pipe = count_pipe();
        let mut batch = StreamMessage::new();
        batch.push_start_edge(10, "A", 1);
        batch.push_start_edge(5, "B", 1);
        let err = pipe.on_next(batch).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::OutOfOrderOutput {
                last_time: 10,
                violating_time: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_completion_does_not_close_pending_ends() {
        let ends = |pipe: &SnapshotWindowPipe<CountAggregate<i64>, &'static str, Collector>| {
            pipe.observer()
                .events()
                .iter()
                .filter(|e| e.kind() == EventKind::EndEdge)
                .count()
        };

        let mut pipe = count_pipe();
        let mut batch = StreamMessage::new();
        batch.push_interval(0, 10, "A", 1);
        pipe.on_next(batch).unwrap();
        pipe.on_completed().unwrap();
        assert!(pipe.observer().is_completed());
        assert_eq!(ends(&pipe), 0);

        let mut pipe = count_pipe();
        let mut batch = StreamMessage::new();
        batch.push_interval(0, 10, "A", 1);
        batch.push_punctuation(INFINITY_SYNC_TIME, "A");
        pipe.on_next(batch).unwrap();
        pipe.on_completed().unwrap();
        let data: Vec<_> = pipe
            .observer()
            .events()
            .iter()
            .filter(|e| !e.kind().is_control())
            .cloned()
            .collect();
        assert_eq!(
            data,
            vec![
                StreamEvent::start_edge(0, "A", 1),
                StreamEvent::end_edge(10, 0, "A", 1),
            ]
        );
    }

    #[test]
    fn test_infinite_punctuation_drains_queue() {
        let mut pipe = count_pipe();
        let mut batch = StreamMessage::new();
        batch.push_interval(0, 100, "A", 1);
        batch.push_start_edge(1, "B", 1);
        batch.push_punctuation(INFINITY_SYNC_TIME, "A");
        pipe.on_next(batch).unwrap();

        assert_eq!(pipe.scheduled_expiries(), 0);
        // B never ends and stays held
        assert_eq!(pipe.held_keys(), 1);
        let ends = pipe
            .observer()
            .events()
            .iter()
            .filter(|e| e.kind() == EventKind::EndEdge)
            .count();
        assert_eq!(ends, 1);
    }

    #[test]
    fn test_small_batches_flush_when_full() {
        let config = PipeConfig::with_batch_size(2);
        let mut pipe = SnapshotWindowPipe::new(CountAggregate::<i64>::new(), Collector::new(), &config);
        let mut batch = StreamMessage::new();
        for t in 0..4 {
            batch.push_interval(t, t + 1, "A", 1);
        }
        pipe.on_next(batch).unwrap();
        assert!(pipe.observer().batch_count() >= 2);
        assert_eq!(pipe.stats().batches_out, pipe.observer().batch_count() as u64);
    }

    #[test]
    fn test_states_disposed_exactly_once() {
        let live = Arc::new(AtomicUsize::new(0));
        let created = live.clone();
        let released = live.clone();
        let agg = FnAggregate::new(
            move || {
                created.fetch_add(1, Ordering::SeqCst);
                0u64
            },
            |s: &mut u64, _, _: &i64| *s += 1,
            |s: &mut u64, _, _: &i64| *s -= 1,
            |s: &mut u64, d: &u64| *s -= d,
            |s: &u64| *s,
        )
        .with_disposer(move |_| {
            released.fetch_sub(1, Ordering::SeqCst);
        });

        {
            let mut pipe = SnapshotWindowPipe::with_defaults(agg, Collector::new());
            let mut batch = StreamMessage::new();
            batch.push_interval(0, 10, "A", 1);
            batch.push_interval(2, 30, "B", 1);
            batch.push_start_edge(4, "C", 1);
            batch.push_punctuation(20, "A");
            pipe.on_next(batch).unwrap();

            pipe.dispose_state();
            assert_eq!(live.load(Ordering::SeqCst), 0);
            pipe.dispose_state();
        }
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
