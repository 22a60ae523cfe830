//! Backfill shard-fanout primitives
//!
//! When a shard is copied to a new replica, the sender streams chunks:
//! key/value atoms, key deletions, range deletions, and index
//! definitions. These types keep a v1.13-stable field order. The copy
//! itself is external; the core supplies the shapes and the region test
//! deciding which keys a range deletion erases.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::region::{key_hash, Region, StoreKey};

use super::index::IndexDefinition;

/// One key/value pair in a backfill stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillAtom {
    pub key: StoreKey,
    pub value: Value,
    /// Recency of the last write to this key on the sender.
    pub recency: u64,
}

/// One unit of a backfill stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "chunk", rename_all = "snake_case")]
pub enum BackfillChunk {
    /// Erase one key.
    DeleteKey { key: StoreKey, recency: u64 },
    /// Erase every key the receiver holds inside `range`.
    DeleteRange { range: Region },
    /// Install a batch of rows.
    KeyValues { atoms: Vec<BackfillAtom> },
    /// Install the table's index definitions.
    Indexes { indexes: Vec<IndexDefinition> },
}

/// Decides which keys a range deletion erases: exactly those the
/// deleted region contains, by hash and by key range.
#[derive(Debug, Clone)]
pub struct RangeKeyTester<'a> {
    delete_range: &'a Region,
}

impl<'a> RangeKeyTester<'a> {
    pub fn new(delete_range: &'a Region) -> Self {
        RangeKeyTester { delete_range }
    }

    pub fn should_erase(&self, key: &StoreKey) -> bool {
        self.delete_range.hash_range.contains(key_hash(key))
            && self.delete_range.key_range.contains(key)
    }
}
