//! Per-scope snapshot machinery shared by both snapshot pipes
//!
//! A [`Timeline`] is everything that advances with one scope's sync time: the
//! keys touched in the current tick, the expired change queue and the output
//! clock. The non-partitioned pipe owns one; the partitioned pipe owns one per
//! partition. Held states live in a single store shared by all timelines.

use super::ecq::ExpiredChangeQueue;
use super::held::{HeldState, HeldStateStore};
use crate::aggregation::{SnapshotAggregate, StateDisposal};
use crate::error::{ProcessorError, Result};
use crate::pipeline::{PipeStats, StreamObserver};
use std::fmt::Debug;
use std::hash::Hash;
use temporal_types::time::{INFINITY_SYNC_TIME, LOW_WATERMARK_OTHER_TIME, PUNCTUATION_OTHER_TIME};
use temporal_types::StreamMessage;
use tracing::{debug, trace};

/// Initial capacity of a fresh output batch
const INITIAL_BATCH_CAPACITY: usize = 1024;

/// Buffers output rows and hands full batches downstream
pub(crate) struct Emitter<K, P, O> {
    observer: O,
    batch: StreamMessage<K, P>,
    batch_size: usize,
}

impl<K, P, O: StreamObserver<K, P>> Emitter<K, P, O> {
    pub(crate) fn new(observer: O, batch_size: usize) -> Self {
        Self {
            observer,
            batch: StreamMessage::with_capacity(batch_size.min(INITIAL_BATCH_CAPACITY)),
            batch_size,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        sync_time: i64,
        other_time: i64,
        key: K,
        hash: u32,
        payload: P,
        control: bool,
        stats: &mut PipeStats,
    ) -> Result<()> {
        self.batch
            .push_raw(sync_time, other_time, key, hash, payload, control);
        if self.batch.is_full(self.batch_size) {
            self.flush(stats)?;
        }
        Ok(())
    }

    /// Send the buffered rows downstream, if any
    pub(crate) fn flush(&mut self, stats: &mut PipeStats) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::replace(
            &mut self.batch,
            StreamMessage::with_capacity(self.batch_size.min(INITIAL_BATCH_CAPACITY)),
        );
        debug!(rows = batch.len(), "Flushing output batch");
        stats.batches_out += 1;
        self.observer.on_next(batch)
    }

    pub(crate) fn observer(&self) -> &O {
        &self.observer
    }

    pub(crate) fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }
}

/// State shared by every timeline of one pipe
pub(crate) struct SnapshotCore<A: SnapshotAggregate, K, O> {
    pub(crate) aggregate: A,
    pub(crate) disposal: StateDisposal<A::State>,
    pub(crate) store: HeldStateStore<K, A::State>,
    pub(crate) emitter: Emitter<K, A::Output, O>,
    pub(crate) stats: PipeStats,
}

impl<A, K, O> SnapshotCore<A, K, O>
where
    A: SnapshotAggregate,
    O: StreamObserver<K, A::Output>,
{
    pub(crate) fn new(aggregate: A, observer: O, batch_size: usize) -> Self {
        let disposal = StateDisposal::capture(&aggregate);
        Self {
            aggregate,
            disposal,
            store: HeldStateStore::new(),
            emitter: Emitter::new(observer, batch_size),
            stats: PipeStats::new(),
        }
    }
}

impl<A: SnapshotAggregate, K, O> SnapshotCore<A, K, O> {
    /// Dispose every held state
    pub(crate) fn dispose_held(&mut self) {
        for state in self.store.drain_states() {
            self.disposal.dispose(state);
            self.stats.states_disposed += 1;
        }
    }
}

/// Sync-time progress of one scope
#[derive(Debug)]
pub struct Timeline<K, S> {
    pending: Vec<usize>,
    ecq: ExpiredChangeQueue<K, S>,
    last_sync_time: i64,
    last_output_time: i64,
    key_count: usize,
}

impl<K, S> Timeline<K, S> {
    /// Timeline with nothing before `floor`
    pub(crate) fn starting_at(floor: i64, bucket_pool_size: usize) -> Self {
        Self {
            pending: Vec::new(),
            ecq: ExpiredChangeQueue::new(bucket_pool_size),
            last_sync_time: floor,
            last_output_time: floor,
            key_count: 0,
        }
    }

    /// Latest sync time this scope has advanced to
    pub fn last_sync_time(&self) -> i64 {
        self.last_sync_time
    }

    /// Number of held keys owned by this scope
    pub fn key_count(&self) -> usize {
        self.key_count
    }

    /// Number of distinct expiry times scheduled
    pub fn scheduled_expiries(&self) -> usize {
        self.ecq.len()
    }

    /// True when the scope holds no keys and no scheduled work
    pub fn is_idle(&self) -> bool {
        self.ecq.is_empty() && self.pending.is_empty() && self.key_count == 0
    }

    /// Dispose every scheduled delta and forget pending keys
    pub(crate) fn dispose_scheduled(&mut self, disposal: &StateDisposal<S>, stats: &mut PipeStats) {
        self.pending.clear();
        for state in self.ecq.drain_states() {
            disposal.dispose(state);
            stats.states_disposed += 1;
        }
    }

    fn check_output<Sc: Debug, P: Debug>(&mut self, scope: &Sc, time: i64, payload: &P) -> Result<()> {
        if time < self.last_output_time {
            return Err(ProcessorError::out_of_order(
                scope,
                self.last_output_time,
                time,
                payload,
            ));
        }
        self.last_output_time = time;
        Ok(())
    }

    fn check_input<Sc: Debug, P: Debug>(&self, scope: &Sc, time: i64, payload: &P) -> Result<()> {
        if time < self.last_sync_time {
            return Err(ProcessorError::out_of_order(
                scope,
                self.last_sync_time,
                time,
                payload,
            ));
        }
        Ok(())
    }
}

impl<K, S> Timeline<K, S>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Close the current tick and move the scope forward to `time`.
    ///
    /// Pending keys publish their result as a start edge (or are evicted),
    /// then every scheduled expiry at or before `time` is applied in order.
    pub(crate) fn advance_time<A, O, Sc>(
        &mut self,
        core: &mut SnapshotCore<A, K, O>,
        scope: &Sc,
        time: i64,
    ) -> Result<()>
    where
        A: SnapshotAggregate<State = S>,
        A::Output: Debug,
        O: StreamObserver<K, A::Output>,
        Sc: Debug,
    {
        let SnapshotCore {
            aggregate,
            disposal,
            store,
            emitter,
            stats,
        } = core;
        trace!(time, pending = self.pending.len(), "Advancing snapshot time");

        for index in self.pending.drain(..) {
            store.clear_pending(index);
            let (key, hash, held) = store.entry_mut(index);
            if held.active > 0 {
                let result = aggregate.compute_result(&held.state);
                let start = held.timestamp;
                if start < self.last_output_time {
                    return Err(ProcessorError::out_of_order(
                        scope,
                        self.last_output_time,
                        start,
                        &result,
                    ));
                }
                self.last_output_time = start;
                emitter.push(start, INFINITY_SYNC_TIME, key.clone(), hash, result, false, stats)?;
                stats.start_edges_out += 1;
            } else {
                let (_, held) = store.remove(index);
                disposal.dispose(held.state);
                self.key_count = self.key_count.saturating_sub(1);
                stats.keys_evicted += 1;
                stats.states_disposed += 1;
            }
        }

        while let Some((due, mut bucket)) = self.ecq.pop_due(time) {
            stats.buckets_drained += 1;
            for (key, hash, delta) in bucket.drain() {
                let Some(index) = store.lookup(&key) else {
                    disposal.dispose(delta.state);
                    stats.states_disposed += 1;
                    continue;
                };
                let (_, _, held) = store.entry_mut(index);
                if held.active > 0 {
                    let result = aggregate.compute_result(&held.state);
                    if due < self.last_output_time {
                        return Err(ProcessorError::out_of_order(
                            scope,
                            self.last_output_time,
                            due,
                            &result,
                        ));
                    }
                    self.last_output_time = due;
                    emitter.push(due, held.timestamp, key.clone(), hash, result, false, stats)?;
                    stats.end_edges_out += 1;
                }
                aggregate.difference(&mut held.state, &delta.state);
                held.active -= delta.active;
                disposal.dispose(delta.state);
                stats.states_disposed += 1;

                if due < time {
                    if held.active > 0 {
                        let result = aggregate.compute_result(&held.state);
                        held.timestamp = due;
                        emitter.push(due, INFINITY_SYNC_TIME, key, hash, result, false, stats)?;
                        stats.start_edges_out += 1;
                    } else {
                        let (_, held) = store.remove(index);
                        disposal.dispose(held.state);
                        self.key_count = self.key_count.saturating_sub(1);
                        stats.keys_evicted += 1;
                        stats.states_disposed += 1;
                    }
                } else {
                    held.timestamp = due;
                    if store.mark_pending(index) {
                        self.pending.push(index);
                    }
                }
            }
            self.ecq.recycle(bucket);
        }

        self.last_sync_time = time;
        Ok(())
    }

    /// Fold one data row into the held state of `key`
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn on_data<A, O, Sc>(
        &mut self,
        core: &mut SnapshotCore<A, K, O>,
        scope: &Sc,
        sync_time: i64,
        other_time: i64,
        key: &K,
        hash: u32,
        payload: &A::Input,
    ) -> Result<()>
    where
        A: SnapshotAggregate<State = S>,
        A::Output: Debug,
        O: StreamObserver<K, A::Output>,
        Sc: Debug,
    {
        self.check_input(scope, sync_time, key)?;
        if sync_time > self.last_sync_time {
            self.advance_time(core, scope, sync_time)?;
        }

        let SnapshotCore {
            aggregate,
            store,
            emitter,
            stats,
            ..
        } = core;
        let aggregate = &*aggregate;
        stats.rows_in += 1;

        let index = match store.lookup(key) {
            Some(index) => index,
            None => {
                self.key_count += 1;
                let held = HeldState::new(aggregate.initial_state(), sync_time);
                store.insert(key.clone(), hash, held)
            }
        };

        // First touch in this tick closes the result published so far
        if store.mark_pending(index) {
            self.pending.push(index);
            let (_, _, held) = store.entry_mut(index);
            if sync_time > held.timestamp {
                if held.active > 0 {
                    let result = aggregate.compute_result(&held.state);
                    if sync_time < self.last_output_time {
                        return Err(ProcessorError::out_of_order(
                            scope,
                            self.last_output_time,
                            sync_time,
                            &result,
                        ));
                    }
                    self.last_output_time = sync_time;
                    emitter.push(sync_time, held.timestamp, key.clone(), hash, result, false, stats)?;
                    stats.end_edges_out += 1;
                }
                held.timestamp = sync_time;
            }
        }

        let (_, _, held) = store.entry_mut(index);
        if sync_time < other_time {
            aggregate.accumulate(&mut held.state, sync_time, payload);
            held.active += 1;
            if other_time != INFINITY_SYNC_TIME {
                self.ecq.merge(
                    other_time,
                    key,
                    hash,
                    || aggregate.initial_state(),
                    |delta| aggregate.accumulate(delta, sync_time, payload),
                );
            }
        } else {
            // End edge: other_time is the start of the retracted event
            aggregate.deaccumulate(&mut held.state, other_time, payload);
            held.active -= 1;
        }
        Ok(())
    }

    /// Advance to a punctuation and forward it
    pub(crate) fn on_punctuation<A, O, Sc>(
        &mut self,
        core: &mut SnapshotCore<A, K, O>,
        scope: &Sc,
        time: i64,
        key: &K,
        hash: u32,
    ) -> Result<()>
    where
        A: SnapshotAggregate<State = S>,
        A::Output: Debug,
        O: StreamObserver<K, A::Output>,
        Sc: Debug,
    {
        self.check_input(scope, time, key)?;
        if time > self.last_sync_time {
            self.advance_time(core, scope, time)?;
        }
        let payload = A::Output::default();
        self.check_output(scope, time, &payload)?;
        core.stats.punctuations += 1;
        core.emitter.push(
            time,
            PUNCTUATION_OTHER_TIME,
            key.clone(),
            hash,
            payload,
            true,
            &mut core.stats,
        )
    }

    /// Advance to `time` if behind it; used for low watermarks
    pub(crate) fn catch_up<A, O, Sc>(
        &mut self,
        core: &mut SnapshotCore<A, K, O>,
        scope: &Sc,
        time: i64,
    ) -> Result<()>
    where
        A: SnapshotAggregate<State = S>,
        A::Output: Debug,
        O: StreamObserver<K, A::Output>,
        Sc: Debug,
    {
        if time > self.last_sync_time {
            self.advance_time(core, scope, time)?;
        }
        if time > self.last_output_time {
            self.last_output_time = time;
        }
        Ok(())
    }
}

/// Forward a low watermark row downstream
pub(crate) fn emit_low_watermark<A, K, O>(
    core: &mut SnapshotCore<A, K, O>,
    time: i64,
    key: K,
    hash: u32,
) -> Result<()>
where
    A: SnapshotAggregate,
    O: StreamObserver<K, A::Output>,
{
    core.stats.low_watermarks += 1;
    core.emitter.push(
        time,
        LOW_WATERMARK_OTHER_TIME,
        key,
        hash,
        A::Output::default(),
        true,
        &mut core.stats,
    )
}
