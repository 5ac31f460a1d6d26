//! Lifetime alteration
//!
//! Pipes that rewrite each event's validity interval from a start-time remap
//! and a duration function, while keeping output sync times non-decreasing
//! per scope.

mod alter;
mod partitioned;

pub use alter::{AlterLifetimePipe, DurationSelector, LifetimeAlteration, Rewrite, StartSelector};
pub use partitioned::PartitionedAlterLifetimePipe;
