//! Snapshot aggregates
//!
//! A snapshot aggregate computes, for every point in time, a result over the
//! events whose lifetimes contain that point. The snapshot pipes maintain the
//! result incrementally, so every aggregate here supports:
//!
//! - **Accumulation**: fold an event into a state
//! - **Deaccumulation**: remove a single event again (explicit retraction)
//! - **Difference**: remove a whole batch of previously folded events at once
//!   (deferred retraction from the expired change queue)
//!
//! # Available Aggregates
//!
//! - [`CountAggregate`]: Count the live events
//! - [`SumAggregate`]: Sum the live values
//! - [`AverageAggregate`]: Mean of the live values
//! - [`MinAggregate`] / [`MaxAggregate`]: Extremes of the live values
//! - [`FnAggregate`]: Any aggregate given as plain functions
//!
//! # Example
//!
//! ```rust
//! use temporal_processor::aggregation::{AverageAggregate, SnapshotAggregate};
//!
//! let agg = AverageAggregate::<f64>::new();
//! let mut held = agg.initial_state();
//! let mut expiring = agg.initial_state();
//!
//! agg.accumulate(&mut held, 0, &10.0);
//! agg.accumulate(&mut held, 0, &30.0);
//! agg.accumulate(&mut expiring, 0, &30.0);
//!
//! // The second event's lifetime ended
//! agg.difference(&mut held, &expiring);
//! assert_eq!(agg.compute_result(&held), 10.0);
//! ```

// Re-name to avoid collision with trait
mod trait_;

mod avg;
mod closure;
mod count;
mod minmax;
mod sum;

pub use trait_::{Disposer, SnapshotAggregate, StateDisposal, ToF64};

pub use avg::{AverageAggregate, AverageState};
pub use closure::FnAggregate;
pub use count::{CountAggregate, CountState};
pub use minmax::{ExtremaState, MaxAggregate, MinAggregate};
pub use sum::{SumAggregate, SumState};
