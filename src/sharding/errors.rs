//! Sharding layer errors

use thiserror::Error;

/// Result type for sharder/unsharder operations
pub type ShardingResult<T> = Result<T, ShardingError>;

/// Failures of the routing layer itself.
///
/// User-level errors produced while executing an operation travel inside
/// response payloads as [`crate::operation::QueryError`] and are not
/// routing failures; these are.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShardingError {
    /// A caller contract was broken: an unsharder was handed a response
    /// count or variant that cannot belong to its operation.
    #[error("sharding invariant violated: {0}")]
    InvariantViolation(String),

    /// The interruptor signal fired while composing responses.
    #[error("operation interrupted")]
    Interrupted,
}

impl ShardingError {
    pub fn invariant(detail: impl Into<String>) -> Self {
        ShardingError::InvariantViolation(detail.into())
    }
}
