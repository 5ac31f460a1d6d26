//! Async driver that feeds batches from a channel into a pipe
//!
//! Pipes are synchronous and single-threaded. The executor owns one pipe on a
//! tokio task, pulls batches off a bounded channel, and flushes the pipe's
//! buffered output whenever the input goes idle.

use crate::error::{ProcessorError, Result};
use crate::pipeline::observer::StreamObserver;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::time::Duration;
use temporal_types::{StreamEvent, StreamMessage};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, error, info, trace};

/// Statistics for a [`BatchExecutor`] run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutorStats {
    /// Batches handed to the pipe
    pub batches_processed: u64,

    /// Rows in those batches, deleted slots included
    pub rows_processed: u64,

    /// Idle flushes issued
    pub idle_flushes: u64,

    /// Batches the pipe rejected
    pub errors: u64,

    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows per second over the finished run
    pub fn rows_per_second(&self) -> f64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => {
                let elapsed = (end - start).num_milliseconds() as f64 / 1000.0;
                if elapsed > 0.0 {
                    self.rows_processed as f64 / elapsed
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}

/// Sending half of an executor's input channel
#[derive(Debug)]
pub struct BatchIngress<K, P> {
    tx: mpsc::Sender<StreamMessage<K, P>>,
    batch_size: usize,
}

impl<K, P> Clone for BatchIngress<K, P> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            batch_size: self.batch_size,
        }
    }
}

impl<K, P> BatchIngress<K, P> {
    /// Send one batch, waiting for channel capacity
    pub async fn ingest(&self, batch: StreamMessage<K, P>) -> Result<()> {
        self.tx
            .send(batch)
            .await
            .map_err(|e| ProcessorError::Execution {
                source: format!("Failed to ingest batch: {}", e).into(),
            })
    }
}

impl<K: Hash + Clone, P: Clone> BatchIngress<K, P> {
    /// Validate `events` and send them in batches of at most `batch_size` rows
    pub async fn ingest_events(&self, events: &[StreamEvent<K, P>]) -> Result<()> {
        let mut offset = 0;
        while offset < events.len() {
            let count = self.batch_size.min(events.len() - offset);
            let batch = StreamMessage::from_segment(events, offset, count)?;
            self.ingest(batch).await?;
            offset += count;
        }
        Ok(())
    }
}

/// Runs a pipe against batches arriving on a channel
///
/// # Example
///
/// ```rust
/// use temporal_processor::pipeline::{BatchExecutor, EventCollector};
/// use temporal_types::StreamEvent;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> temporal_processor::ProcessorResult<()> {
/// let (ingress, executor) = BatchExecutor::channel(EventCollector::<u32, i64>::new(), 16, 1024);
/// let handle = tokio::spawn(executor.run());
///
/// ingress.ingest_events(&[StreamEvent::start_edge(0, 1, 42)]).await?;
/// drop(ingress);
///
/// let (collector, stats) = handle.await.expect("executor task panicked")?;
/// assert_eq!(collector.events().len(), 1);
/// assert_eq!(stats.batches_processed, 1);
/// # Ok(())
/// # }
/// ```
pub struct BatchExecutor<K, P, O> {
    input_rx: mpsc::Receiver<StreamMessage<K, P>>,
    observer: O,
    idle_flush: Duration,
    stats: ExecutorStats,
}

impl<K, P, O> BatchExecutor<K, P, O>
where
    O: StreamObserver<K, P>,
{
    /// Create an executor for `observer` with a channel of `buffer` batches.
    ///
    /// `batch_size` bounds the batches [`BatchIngress::ingest_events`] builds.
    pub fn channel(observer: O, buffer: usize, batch_size: usize) -> (BatchIngress<K, P>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let ingress = BatchIngress {
            tx,
            batch_size: batch_size.max(1),
        };
        let executor = Self {
            input_rx: rx,
            observer,
            idle_flush: Duration::from_millis(100),
            stats: ExecutorStats::new(),
        };
        (ingress, executor)
    }

    /// Flush the pipe when no batch arrives for `interval`
    pub fn with_idle_flush(mut self, interval: Duration) -> Self {
        self.idle_flush = interval;
        self
    }

    /// Process batches until every ingress is dropped, then complete the pipe.
    ///
    /// Stops at the first batch the pipe rejects: after an error its state can
    /// no longer be trusted.
    pub async fn run(mut self) -> Result<(O, ExecutorStats)> {
        info!("Starting batch executor");
        self.stats.started_at = Some(Utc::now());

        loop {
            match time::timeout(self.idle_flush, self.input_rx.recv()).await {
                Ok(Some(batch)) => {
                    let rows = batch.len() as u64;
                    trace!(rows, "Processing batch");
                    if let Err(e) = self.observer.on_next(batch) {
                        error!(error = %e, "Pipe rejected batch");
                        self.stats.errors += 1;
                        return Err(e);
                    }
                    self.stats.batches_processed += 1;
                    self.stats.rows_processed += rows;
                }
                Ok(None) => {
                    debug!("Input channel closed");
                    break;
                }
                Err(_) => {
                    // Idle
                    self.observer.on_flush()?;
                    self.stats.idle_flushes += 1;
                }
            }
        }

        self.observer.on_completed()?;
        self.stats.finished_at = Some(Utc::now());
        info!(
            batches = self.stats.batches_processed,
            rows = self.stats.rows_processed,
            "Batch executor finished"
        );
        Ok((self.observer, self.stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::observer::EventCollector;

    #[tokio::test]
    async fn test_executor_splits_and_completes() {
        let (ingress, executor) = BatchExecutor::channel(EventCollector::<u32, i64>::new(), 4, 2);
        let handle = tokio::spawn(executor.run());

        let events: Vec<_> = (0..5).map(|t| StreamEvent::start_edge(t, 1, t)).collect();
        ingress.ingest_events(&events).await.unwrap();
        drop(ingress);

        let (collector, stats) = handle.await.unwrap().unwrap();
        assert!(collector.is_completed());
        assert_eq!(collector.events().len(), 5);
        assert_eq!(stats.batches_processed, 3);
        assert_eq!(stats.rows_processed, 5);
        assert!(stats.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_malformed_events_rejected_before_send() {
        let (ingress, executor) = BatchExecutor::channel(EventCollector::<u32, i64>::new(), 4, 8);
        let handle = tokio::spawn(executor.run());

        let events = vec![StreamEvent::start_edge(i64::MAX, 1, 0)];
        assert!(ingress.ingest_events(&events).await.is_err());
        drop(ingress);

        let (collector, stats) = handle.await.unwrap().unwrap();
        assert!(collector.events().is_empty());
        assert_eq!(stats.batches_processed, 0);
    }

    #[tokio::test]
    async fn test_pipe_error_stops_executor() {
        use crate::pipeline::observer::EgressShape;

        let collector = EventCollector::<u32, i64>::with_shape(EgressShape::IntervalOnly);
        let (ingress, executor) = BatchExecutor::channel(collector, 4, 8);
        let handle = tokio::spawn(executor.run());

        ingress
            .ingest_events(&[StreamEvent::start_edge(0, 1, 0)])
            .await
            .unwrap();
        drop(ingress);

        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(ProcessorError::UnexpectedEventShape { .. })
        ));
    }
}
