//! Error types for the stream processor
//!
//! Every error raised by a pipe is fatal for the query it belongs to: the core
//! is a deterministic in-process computation, so there is nothing to retry.
//! Output already flushed downstream before the error is not rolled back.

use temporal_types::TypesError;
use thiserror::Error;

/// Main processor error type
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// A pipe computed an output row earlier than one it already emitted
    #[error("out-of-order output in scope {scope}: time {violating_time} is before last emitted time {last_time} (payload: {payload})")]
    OutOfOrderOutput {
        scope: String,
        last_time: i64,
        violating_time: i64,
        payload: String,
    },

    /// Timestamp arithmetic left the representable range
    #[error("arithmetic overflow in {operation}: {lhs} + {rhs} exceeds the maximum sync time")]
    ArithmeticOverflow {
        operation: String,
        lhs: i64,
        rhs: i64,
    },

    /// An egress point received a row of a shape it does not accept
    #[error("unexpected event shape: expected {expected}, got [{sync_time}, {other_time})")]
    UnexpectedEventShape {
        expected: String,
        sync_time: i64,
        other_time: i64,
    },

    /// Malformed ingress input
    #[error("ingress error: {0}")]
    Ingress(#[from] TypesError),

    /// Signal window errors
    #[error("window error: {0}")]
    Window(#[from] WindowError),

    /// Configuration errors
    #[error("configuration error: {source}")]
    Configuration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Execution errors
    #[error("execution error: {source}")]
    Execution {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Signal window configuration and sampling errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// Sampling period is invalid
    #[error("invalid sampling period: {period} ticks, must be greater than 0")]
    InvalidPeriod { period: i64 },

    /// Window size is invalid
    #[error("invalid window size: {size} samples, must be greater than 0")]
    InvalidWindowSize { size: usize },

    /// Hop size is invalid
    #[error("invalid hop size: {hop} samples, must be greater than 0")]
    InvalidHopSize { hop: usize },

    /// A sample does not sit on the period grid
    #[error("misaligned sample at {time}: samples are expected at {offset} + k * {period}")]
    MisalignedSample { time: i64, offset: i64, period: i64 },

    /// A sample arrived earlier than the next expected sample
    #[error("out-of-order sample: got {time}, next expected sample is {expected}")]
    OutOfOrderSample { time: i64, expected: i64 },

    /// Enqueue called for a time the window is not positioned at
    #[error("window not positioned for sample at {time}: next sample time is {next_sample_time}")]
    NotPositioned { time: i64, next_sample_time: i64 },
}

/// Result type alias for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Result type alias for window operations
pub type WindowResult<T> = std::result::Result<T, WindowError>;

impl ProcessorError {
    /// Build an ordering violation, rendering the scope and payload for the message
    pub fn out_of_order<S: std::fmt::Debug, P: std::fmt::Debug>(
        scope: &S,
        last_time: i64,
        violating_time: i64,
        payload: &P,
    ) -> Self {
        ProcessorError::OutOfOrderOutput {
            scope: format!("{:?}", scope),
            last_time,
            violating_time,
            payload: format!("{:?}", payload),
        }
    }
}

impl From<serde_json::Error> for ProcessorError {
    fn from(err: serde_json::Error) -> Self {
        ProcessorError::Serialization(err.to_string())
    }
}
