//! Push-based observer protocol between pipes
//!
//! Every pipe is a [`StreamObserver`] for its input and owns the observer for
//! its output. A call to `on_next` processes the whole batch, including any
//! downstream `on_next` calls it triggers, before returning.

use crate::error::{ProcessorError, Result};
use serde::{Deserialize, Serialize};
use temporal_types::{EventKind, StreamEvent, StreamMessage};

/// Receiver of event batches
pub trait StreamObserver<K, P> {
    /// Process one batch
    fn on_next(&mut self, batch: StreamMessage<K, P>) -> Result<()>;

    /// Push any buffered output downstream
    fn on_flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// The input stream has ended
    ///
    /// Completion flushes buffered output but does not move time. Results
    /// waiting on later time stay unpublished; push a punctuation or low
    /// watermark at `INFINITY_SYNC_TIME` first to close them.
    fn on_completed(&mut self) -> Result<()> {
        self.on_flush()
    }
}

impl<K, P, O: StreamObserver<K, P> + ?Sized> StreamObserver<K, P> for Box<O> {
    fn on_next(&mut self, batch: StreamMessage<K, P>) -> Result<()> {
        (**self).on_next(batch)
    }

    fn on_flush(&mut self) -> Result<()> {
        (**self).on_flush()
    }

    fn on_completed(&mut self) -> Result<()> {
        (**self).on_completed()
    }
}

/// Row shapes an egress point accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EgressShape {
    /// Any data row
    Any,
    /// Start edges only
    StartEdgeOnly,
    /// Intervals only
    IntervalOnly,
}

impl EgressShape {
    fn accepts(&self, kind: EventKind) -> bool {
        match self {
            EgressShape::Any => true,
            EgressShape::StartEdgeOnly => kind == EventKind::StartEdge,
            EgressShape::IntervalOnly => kind == EventKind::Interval,
        }
    }
}

/// Egress sink that materializes every row it receives
///
/// Deleted slots are skipped. Control rows are kept unless
/// [`EventCollector::data_only`] is set.
#[derive(Debug, Clone)]
pub struct EventCollector<K, P> {
    shape: EgressShape,
    include_control: bool,
    events: Vec<StreamEvent<K, P>>,
    batches: usize,
    completed: bool,
}

impl<K, P> Default for EventCollector<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> EventCollector<K, P> {
    /// Collector accepting any row shape
    pub fn new() -> Self {
        Self::with_shape(EgressShape::Any)
    }

    /// Collector rejecting rows that do not match `shape`
    pub fn with_shape(shape: EgressShape) -> Self {
        Self {
            shape,
            include_control: true,
            events: Vec::new(),
            batches: 0,
            completed: false,
        }
    }

    /// Drop punctuation and low-watermark rows instead of collecting them
    pub fn data_only(mut self) -> Self {
        self.include_control = false;
        self
    }

    pub fn events(&self) -> &[StreamEvent<K, P>] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<StreamEvent<K, P>> {
        std::mem::take(&mut self.events)
    }

    /// Number of non-empty batches received
    pub fn batch_count(&self) -> usize {
        self.batches
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl<K: Clone, P: Clone> StreamObserver<K, P> for EventCollector<K, P> {
    fn on_next(&mut self, batch: StreamMessage<K, P>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.batches += 1;
        for i in 0..batch.len() {
            let kind = batch.kind(i);
            if kind == EventKind::Deleted {
                continue;
            }
            if kind.is_control() {
                if !self.include_control {
                    continue;
                }
            } else if !self.shape.accepts(kind) {
                return Err(ProcessorError::UnexpectedEventShape {
                    expected: format!("{:?}", self.shape),
                    sync_time: batch.sync_time[i],
                    other_time: batch.other_time[i],
                });
            }
            if let Some(event) = batch.event(i) {
                self.events.push(event);
            }
        }
        Ok(())
    }

    fn on_completed(&mut self) -> Result<()> {
        self.completed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_skips_deleted_slots() {
        let mut batch: StreamMessage<u32, i32> = StreamMessage::new();
        batch.push_start_edge(0, 1, 10);
        batch.push_start_edge(1, 1, 11);
        batch.mark_deleted(0);
        batch.push_punctuation(5, 0);

        let mut collector = EventCollector::new();
        collector.on_next(batch).unwrap();
        assert_eq!(collector.events().len(), 2);
        assert_eq!(collector.events()[0].payload, 11);
        assert_eq!(collector.batch_count(), 1);
    }

    #[test]
    fn test_start_edge_only_rejects_interval() {
        let mut batch: StreamMessage<u32, i32> = StreamMessage::new();
        batch.push_start_edge(0, 1, 10);
        batch.push_interval(1, 4, 1, 11);

        let mut collector = EventCollector::with_shape(EgressShape::StartEdgeOnly);
        let err = collector.on_next(batch).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::UnexpectedEventShape {
                sync_time: 1,
                other_time: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_data_only_drops_control_rows() {
        let mut batch: StreamMessage<(), i32> = StreamMessage::new();
        batch.push_interval(0, 3, (), 1);
        batch.push_low_watermark(3);

        let mut collector = EventCollector::new().data_only();
        collector.on_next(batch).unwrap();
        collector.on_completed().unwrap();
        assert_eq!(collector.events().len(), 1);
        assert!(collector.is_completed());
    }
}
