//! Pipe plumbing
//!
//! - [`StreamObserver`]: the push protocol every pipe implements
//! - [`EventCollector`]: an egress sink that materializes rows
//! - [`BatchExecutor`]: drives a pipe from an async channel
//! - [`PipeStats`]: per-pipe counters

pub mod executor;
pub mod observer;
pub mod stats;

pub use executor::{BatchExecutor, BatchIngress, ExecutorStats};
pub use observer::{EgressShape, EventCollector, StreamObserver};
pub use stats::PipeStats;
