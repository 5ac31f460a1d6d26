use crate::error::{ProcessorError, Result};
use crate::pipeline::{PipeStats, StreamObserver};
use std::fmt::{self, Debug};
use std::sync::Arc;
use temporal_types::time::{checked_end_time, INFINITY_SYNC_TIME};
use temporal_types::{EventKind, StreamMessage};
use tracing::{trace, warn};

/// Remaps an event's start time
pub type StartSelector = Arc<dyn Fn(i64) -> i64 + Send + Sync>;

/// How the new lifetime of an event is computed
#[derive(Clone)]
pub enum DurationSelector {
    /// Every event lives for the same number of ticks
    Constant(i64),
    /// Duration computed from the original start time
    FromStart(Arc<dyn Fn(i64) -> i64 + Send + Sync>),
    /// Duration computed from the original start and end times
    FromInterval(Arc<dyn Fn(i64, i64) -> i64 + Send + Sync>),
}

impl DurationSelector {
    pub fn constant(duration: i64) -> Self {
        DurationSelector::Constant(duration)
    }

    pub fn from_start(f: impl Fn(i64) -> i64 + Send + Sync + 'static) -> Self {
        DurationSelector::FromStart(Arc::new(f))
    }

    pub fn from_interval(f: impl Fn(i64, i64) -> i64 + Send + Sync + 'static) -> Self {
        DurationSelector::FromInterval(Arc::new(f))
    }

    /// New duration of an event originally spanning `[start, end)`
    pub fn duration(&self, start: i64, end: i64) -> i64 {
        match self {
            DurationSelector::Constant(d) => *d,
            DurationSelector::FromStart(f) => f(start),
            DurationSelector::FromInterval(f) => f(start, end),
        }
    }
}

impl Debug for DurationSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationSelector::Constant(d) => f.debug_tuple("Constant").field(d).finish(),
            DurationSelector::FromStart(_) => f.write_str("FromStart(..)"),
            DurationSelector::FromInterval(_) => f.write_str("FromInterval(..)"),
        }
    }
}

/// Start remap plus duration: the pure part of a lifetime alteration
#[derive(Clone)]
pub struct LifetimeAlteration {
    start: Option<StartSelector>,
    duration: DurationSelector,
}

/// Outcome of rewriting one data row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewrite {
    /// Row keeps living as `[start, end)`
    Keep { start: i64, end: i64 },
    /// Row is an end edge; the rewritten start carries its own end
    DropRetraction,
    /// Computed duration was not positive
    DropEmpty { duration: i64 },
}

impl LifetimeAlteration {
    pub fn new(start: Option<StartSelector>, duration: DurationSelector) -> Self {
        Self { start, duration }
    }

    /// Apply the start remap; an infinite time is never remapped
    pub fn remap(&self, time: i64) -> i64 {
        match &self.start {
            Some(f) if time != INFINITY_SYNC_TIME => f(time),
            _ => time,
        }
    }

    /// Rewrite a data row of the given kind
    pub fn rewrite(&self, kind: EventKind, sync_time: i64, other_time: i64) -> Result<Rewrite> {
        if kind == EventKind::EndEdge {
            return Ok(Rewrite::DropRetraction);
        }
        let duration = self.duration.duration(sync_time, other_time);
        if duration <= 0 {
            return Ok(Rewrite::DropEmpty { duration });
        }
        let start = self.remap(sync_time);
        let end = checked_end_time(start, duration).ok_or_else(|| ProcessorError::ArithmeticOverflow {
            operation: "lifetime end time".to_string(),
            lhs: start,
            rhs: duration,
        })?;
        Ok(Rewrite::Keep { start, end })
    }
}

impl Debug for LifetimeAlteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeAlteration")
            .field("remaps_start", &self.start.is_some())
            .field("duration", &self.duration)
            .finish()
    }
}

/// Apply a kept or dropped rewrite to slot `i`, updating `stats`
pub(crate) fn apply_rewrite<K, P>(
    batch: &mut StreamMessage<K, P>,
    i: usize,
    rewrite: Rewrite,
    stats: &mut PipeStats,
) {
    match rewrite {
        Rewrite::Keep { start, end } => {
            batch.sync_time[i] = start;
            batch.other_time[i] = end;
            if end == INFINITY_SYNC_TIME {
                stats.start_edges_out += 1;
            } else {
                stats.intervals_out += 1;
            }
        }
        Rewrite::DropRetraction => {
            trace!(sync_time = batch.sync_time[i], "Dropping end edge");
            batch.mark_deleted(i);
            stats.rows_deleted += 1;
        }
        Rewrite::DropEmpty { duration } => {
            warn!(
                sync_time = batch.sync_time[i],
                other_time = batch.other_time[i],
                duration,
                "Dropping event with non-positive lifetime"
            );
            batch.mark_deleted(i);
            stats.rows_deleted += 1;
        }
    }
}

const GLOBAL_SCOPE: &str = "global";

/// Rewrites event lifetimes of a non-partitioned stream
///
/// Start edges and intervals become `[remap(start), remap(start) + duration)`.
/// End edges are dropped since the rewritten start already carries its end.
/// Punctuations and low watermarks only get the start remap, floored at the
/// latest output time.
///
/// # Example
///
/// ```rust
/// use temporal_processor::lifetime::{AlterLifetimePipe, DurationSelector};
/// use temporal_processor::pipeline::{EventCollector, StreamObserver};
/// use temporal_types::{StreamEvent, StreamMessage};
///
/// let mut pipe = AlterLifetimePipe::new(
///     None,
///     DurationSelector::constant(10),
///     EventCollector::<u32, i64>::new(),
/// );
/// let mut batch = StreamMessage::new();
/// batch.push_start_edge(5, 1, 42);
/// pipe.on_next(batch).unwrap();
///
/// assert_eq!(pipe.observer().events(), &[StreamEvent::interval(5, 15, 1, 42)]);
/// ```
pub struct AlterLifetimePipe<K, P, O> {
    alteration: LifetimeAlteration,
    observer: O,
    last_time: i64,
    stats: PipeStats,
    _marker: std::marker::PhantomData<fn(K, P)>,
}

impl<K, P, O> AlterLifetimePipe<K, P, O>
where
    O: StreamObserver<K, P>,
{
    pub fn new(start: Option<StartSelector>, duration: DurationSelector, observer: O) -> Self {
        Self {
            alteration: LifetimeAlteration::new(start, duration),
            observer,
            last_time: i64::MIN,
            stats: PipeStats::new(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn stats(&self) -> &PipeStats {
        &self.stats
    }

    /// Latest output sync time
    pub fn last_time(&self) -> i64 {
        self.last_time
    }
}

impl<K, P, O> StreamObserver<K, P> for AlterLifetimePipe<K, P, O>
where
    P: Debug,
    O: StreamObserver<K, P>,
{
    fn on_next(&mut self, mut batch: StreamMessage<K, P>) -> Result<()> {
        for i in 0..batch.len() {
            let kind = batch.kind(i);
            match kind {
                EventKind::Deleted => {}
                EventKind::Punctuation | EventKind::LowWatermark => {
                    let time = self.alteration.remap(batch.sync_time[i]).max(self.last_time);
                    batch.sync_time[i] = time;
                    self.last_time = time;
                    if kind == EventKind::Punctuation {
                        self.stats.punctuations += 1;
                    } else {
                        self.stats.low_watermarks += 1;
                    }
                }
                _ => {
                    self.stats.rows_in += 1;
                    let rewrite = self
                        .alteration
                        .rewrite(kind, batch.sync_time[i], batch.other_time[i])?;
                    if let Rewrite::Keep { start, .. } = rewrite {
                        if start < self.last_time {
                            return Err(ProcessorError::out_of_order(
                                &GLOBAL_SCOPE,
                                self.last_time,
                                start,
                                &batch.payload[i],
                            ));
                        }
                        self.last_time = start;
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
