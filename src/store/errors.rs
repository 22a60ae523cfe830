//! Errors surfaced by the storage contract

use thiserror::Error;

/// Result type for storage-contract operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures a store may surface to the core.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The drain or interrupt signal fired while waiting on the store.
    /// The post-construction engine catches this at exactly one site to
    /// run its emergency deregister path; everywhere else it unwinds.
    #[error("storage operation interrupted")]
    Interrupted,

    /// Block acquisition is impossible, e.g. the store is shutting its
    /// cache down.
    #[error("storage blocks unavailable: {0}")]
    BlocksUnavailable(String),

    /// On-disk state failed validation.
    #[error("storage corruption: {0}")]
    Corruption(String),

    /// An underlying I/O failure.
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, StoreError::Interrupted)
    }
}
