//! Modification reports
//!
//! The storage engine produces one report per committed key mutation;
//! registered modification queues buffer them for replay into indexes
//! under construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::region::StoreKey;

/// A record of a single key mutation.
///
/// `old_value` and `new_value` are both present for an update, only one
/// for an insert or delete. Applying a report to an index is idempotent:
/// replaying it yields the same index state, which is what makes
/// at-least-once delivery through the modification queue sufficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModReport {
    pub key: StoreKey,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    /// Per-store monotonic write counter at commit time.
    pub recency: u64,
    /// Wall-clock commit time, for operator-facing surfaces only.
    pub timestamp: DateTime<Utc>,
}

impl ModReport {
    /// A report for a fresh insert.
    pub fn insert(key: StoreKey, value: Value, recency: u64) -> Self {
        ModReport {
            key,
            old_value: None,
            new_value: Some(value),
            recency,
            timestamp: Utc::now(),
        }
    }

    /// A report for an overwrite of an existing row.
    pub fn update(key: StoreKey, old_value: Value, new_value: Value, recency: u64) -> Self {
        ModReport {
            key,
            old_value: Some(old_value),
            new_value: Some(new_value),
            recency,
            timestamp: Utc::now(),
        }
    }

    /// A report for a deletion.
    pub fn delete(key: StoreKey, old_value: Value, recency: u64) -> Self {
        ModReport {
            key,
            old_value: Some(old_value),
            new_value: None,
            recency,
            timestamp: Utc::now(),
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.new_value.is_none()
    }
}
