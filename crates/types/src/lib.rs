//! Core data model for the temporal snapshot engine
//!
//! This crate provides the columnar event batch, the timestamp sentinels that
//! encode control rows, and the key types used to partition streams.

pub mod batch;
pub mod errors;
pub mod key;
pub mod time;

pub use batch::{BitVector, EventKind, StreamEvent, StreamMessage};
pub use errors::{Result, TypesError};
pub use key::{hash_key, CompoundGroupKey, PartitionKey, PartitionedKey};
