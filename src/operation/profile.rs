//! Profiling attachments for operations and responses

use serde::{Deserialize, Serialize};

/// Whether an operation collects a profiling event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Enabled,
    Disabled,
}

impl Profile {
    pub fn is_enabled(self) -> bool {
        matches!(self, Profile::Enabled)
    }
}

/// One entry in a response's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEvent {
    /// What happened, e.g. "perform read on shard".
    pub description: String,
    /// Wall time spent, in microseconds.
    pub duration_micros: u64,
}

impl ProfileEvent {
    pub fn new(description: impl Into<String>, duration_micros: u64) -> Self {
        ProfileEvent {
            description: description.into(),
            duration_micros,
        }
    }
}
