//! Incremental snapshot window aggregation
//!
//! A snapshot window computes, per grouping key, an aggregate over the events
//! whose lifetimes overlap each instant, and emits a new result every time
//! that set changes. Results are emitted as start/end edge pairs: the start
//! edge publishes a value, the matching end edge (same key, `other_time` equal
//! to the start) retracts it.
//!
//! Two structures carry the state:
//!
//! - [`HeldStateStore`]: the current aggregate per key, mutated in place
//! - [`ExpiredChangeQueue`]: deltas of interval events, keyed by end time, so
//!   all expiries at one instant are retracted with a single `difference`
//!
//! [`SnapshotWindowPipe`] runs one timeline for the whole stream;
//! [`PartitionedSnapshotWindowPipe`] runs one per partition.

mod ecq;
mod held;
mod partitioned;
mod pipe;
mod timeline;

pub use ecq::{ChangeBucket, ExpiredChangeQueue, StateAndActive};
pub use held::{HeldState, HeldStateStore};
pub use partitioned::{PartitionEntry, PartitionedSnapshotWindowPipe};
pub use pipe::SnapshotWindowPipe;
pub use timeline::Timeline;
