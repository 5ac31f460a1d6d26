//! Error types for the batch data model

use thiserror::Error;

/// Result type alias for data model operations
pub type Result<T> = std::result::Result<T, TypesError>;

/// Errors raised while building or validating event batches
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// An ingress array segment does not fit inside its backing array
    #[error("malformed array segment: offset {offset} + count {count} exceeds length {len}")]
    MalformedSegment {
        offset: usize,
        count: usize,
        len: usize,
    },

    /// An event whose timestamps cannot be represented in a batch
    #[error("invalid event [{sync_time}, {other_time}): {reason}")]
    InvalidEvent {
        sync_time: i64,
        other_time: i64,
        reason: String,
    },
}
