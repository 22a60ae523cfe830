//! Structured logging for long-running core tasks

mod logger;

pub use logger::{Logger, Severity};
