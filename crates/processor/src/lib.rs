//! Temporal stream processor
//!
//! This crate provides incremental operators over streams of timestamped
//! events carried in columnar [`StreamMessage`](temporal_types::StreamMessage)
//! batches:
//!
//! - [`snapshot`]: per-key snapshot aggregation emitting start/end edges
//! - [`lifetime`]: rewriting event lifetimes (AlterLifetime)
//! - [`window`]: tumbling and hopping windows over uniformly sampled signals
//!
//! Pipes are push-based [`StreamObserver`]s and are chained by ownership. A
//! [`BatchExecutor`] runs a pipe chain on a tokio task fed by a channel.

pub mod aggregation;
pub mod config;
pub mod error;
pub mod lifetime;
pub mod pipeline;
pub mod snapshot;
pub mod watermark;
pub mod window;

// Re-export commonly used types
pub use aggregation::{
    AverageAggregate, CountAggregate, FnAggregate, MaxAggregate, MinAggregate, SnapshotAggregate,
    SumAggregate,
};

pub use error::{ProcessorError, Result as ProcessorResult, WindowError, WindowResult};

pub use config::{PipeConfig, ProcessorConfig, SignalWindowConfig};

pub use lifetime::{AlterLifetimePipe, DurationSelector, PartitionedAlterLifetimePipe};

pub use pipeline::{
    BatchExecutor, BatchIngress, EgressShape, EventCollector, ExecutorStats, PipeStats,
    StreamObserver,
};

pub use snapshot::{PartitionedSnapshotWindowPipe, SnapshotWindowPipe};

pub use watermark::{
    BoundedOutOfOrdernessWatermark, PunctuatedWatermark, Watermark, WatermarkGenerator,
};

pub use window::{
    create_signal_window, BaseWindow, SignalWindow, SignalWindowOperator, WindowObserver,
    WindowRecorder,
};
