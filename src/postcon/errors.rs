//! Modification-queue error types
//!
//! Error codes:
//! - QUEUE_APPEND_FAILED (ERROR severity)
//! - QUEUE_FSYNC_FAILED (FATAL severity)
//! - QUEUE_CORRUPTION (FATAL severity)

use std::fmt;
use std::io;

/// Severity levels for queue errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the store continues
    Error,
    /// The store must halt
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Queue-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueErrorCode {
    /// Appending a modification report failed
    QueueAppendFailed,
    /// fsync after an append failed
    QueueFsyncFailed,
    /// A popped record failed checksum or decode
    QueueCorruption,
}

impl QueueErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            QueueErrorCode::QueueAppendFailed => "QUEUE_APPEND_FAILED",
            QueueErrorCode::QueueFsyncFailed => "QUEUE_FSYNC_FAILED",
            QueueErrorCode::QueueCorruption => "QUEUE_CORRUPTION",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            QueueErrorCode::QueueAppendFailed => Severity::Error,
            QueueErrorCode::QueueFsyncFailed => Severity::Fatal,
            QueueErrorCode::QueueCorruption => Severity::Fatal,
        }
    }
}

impl fmt::Display for QueueErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Modification-queue error with full context
#[derive(Debug)]
pub struct QueueError {
    code: QueueErrorCode,
    message: String,
    /// Byte offset in the queue file, when known
    offset: Option<u64>,
    source: Option<io::Error>,
}

impl QueueError {
    pub fn append_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: QueueErrorCode::QueueAppendFailed,
            message: message.into(),
            offset: None,
            source: Some(source),
        }
    }

    pub fn fsync_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: QueueErrorCode::QueueFsyncFailed,
            message: message.into(),
            offset: None,
            source: Some(source),
        }
    }

    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            code: QueueErrorCode::QueueCorruption,
            message: reason.into(),
            offset: Some(offset),
            source: None,
        }
    }

    pub fn code(&self) -> QueueErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(offset) = self.offset {
            write!(f, " (byte_offset: {})", offset)?;
        }
        Ok(())
    }
}

impl std::error::Error for QueueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

impl From<QueueError> for crate::store::StoreError {
    fn from(e: QueueError) -> Self {
        match e.code() {
            QueueErrorCode::QueueCorruption => crate::store::StoreError::Corruption(e.to_string()),
            _ => crate::store::StoreError::Io(io::Error::new(io::ErrorKind::Other, e)),
        }
    }
}
