//! Batch sizing for range-read fetches

use serde::{Deserialize, Serialize};

/// Number of CPU shards each table's key space is split across on one
/// store. The sharder scales range-read batch specs down by this factor
/// so a full fan-out fetches roughly one logical batch in total.
pub const CPU_SHARDING_FACTOR: usize = 8;

/// Governs how many rows one storage fetch returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSpec {
    /// Upper bound on rows per fetch.
    pub max_rows: usize,
    /// Soft byte target per fetch; the storage layer stops after the row
    /// that crosses it.
    pub target_bytes: usize,
}

impl Default for BatchSpec {
    fn default() -> Self {
        BatchSpec {
            max_rows: 1024,
            target_bytes: 1024 * 1024,
        }
    }
}

impl BatchSpec {
    /// Divides both limits by `factor`, never dropping below one row.
    pub fn scale_down(&self, factor: usize) -> BatchSpec {
        debug_assert!(factor > 0);
        BatchSpec {
            max_rows: (self.max_rows / factor).max(1),
            target_bytes: (self.target_bytes / factor).max(1),
        }
    }
}
