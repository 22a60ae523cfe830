//! Write operations and their region extraction
//!
//! Point writes, deletes, and sync keep a v1.13-stable field order;
//! batched writes are cluster-only v1.14+ shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::region::{encode_primary, key_hash, HashRange, KeyBound, KeyRange, Region, StoreKey};

use super::index::IndexDefinition;
use super::profile::Profile;

/// Whether a write's acknowledgment waits for fsync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    Hard,
    Soft,
}

/// Caps applied to result-array-valued fields when composing write
/// statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub array_size_limit: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            array_size_limit: 100_000,
        }
    }
}

/// What a batched insert does when the key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictBehavior {
    Error,
    Replace,
    Update,
}

/// A logical write, as dispatched by the query layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Write {
    pub op: WriteOp,
    pub durability: Durability,
    pub profile: Profile,
    pub limits: Limits,
}

impl Write {
    pub fn new(op: WriteOp) -> Self {
        Write {
            op,
            durability: Durability::Hard,
            profile: Profile::Disabled,
            limits: Limits::default(),
        }
    }

    /// The region of key space this write touches.
    pub fn region(&self) -> Region {
        self.op.region()
    }
}

/// The write variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOp {
    /// Apply a replacement function to a set of existing keys.
    BatchedReplace {
        keys: Vec<StoreKey>,
        primary_key: String,
        /// The replacement function, carried as an opaque wire term.
        func: Value,
        return_changes: bool,
    },
    /// Insert a batch of rows.
    BatchedInsert {
        rows: Vec<Value>,
        primary_key: String,
        conflict: ConflictBehavior,
        limits: Limits,
        return_changes: bool,
    },
    /// Store one row.
    PointWrite {
        key: StoreKey,
        data: Value,
        overwrite: bool,
    },
    /// Delete one row.
    PointDelete { key: StoreKey },
    /// Create a secondary index over a region.
    IndexCreate {
        region: Region,
        definition: IndexDefinition,
    },
    /// Drop a secondary index.
    IndexDrop { region: Region, name: String },
    /// Rename a secondary index.
    IndexRename {
        region: Region,
        old_name: String,
        new_name: String,
        overwrite: bool,
    },
    /// Flush soft-durability writes for a region.
    Sync { region: Region },
}

impl WriteOp {
    /// The region of key space this write touches.
    pub fn region(&self) -> Region {
        match self {
            WriteOp::BatchedReplace { keys, .. } => region_from_keys(keys.iter()),
            WriteOp::BatchedInsert {
                rows, primary_key, ..
            } => {
                let keys: Vec<StoreKey> = rows
                    .iter()
                    .map(|row| insert_row_key(row, primary_key))
                    .collect();
                region_from_keys(keys.iter())
            }
            WriteOp::PointWrite { key, .. } => Region::monokey(key),
            WriteOp::PointDelete { key } => Region::monokey(key),
            WriteOp::IndexCreate { region, .. } => region.clone(),
            WriteOp::IndexDrop { region, .. } => region.clone(),
            WriteOp::IndexRename { region, .. } => region.clone(),
            WriteOp::Sync { region } => region.clone(),
        }
    }

    /// Operation name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::BatchedReplace { .. } => "batched_replace",
            WriteOp::BatchedInsert { .. } => "batched_insert",
            WriteOp::PointWrite { .. } => "point_write",
            WriteOp::PointDelete { .. } => "point_delete",
            WriteOp::IndexCreate { .. } => "index_create",
            WriteOp::IndexDrop { .. } => "index_drop",
            WriteOp::IndexRename { .. } => "index_rename",
            WriteOp::Sync { .. } => "sync",
        }
    }
}

/// The primary key of a row being inserted: the primary-key field's
/// value under the primary encoding. A missing field encodes as null;
/// rejecting that is the storage layer's job, the router only needs a
/// stable position for it.
pub fn insert_row_key(row: &Value, primary_key: &str) -> StoreKey {
    encode_primary(row.get(primary_key).unwrap_or(&Value::Null))
}

/// The minimal bounding region of a non-empty key set: the tight hash
/// interval `[min_hash, max_hash + 1)` over the closed key interval
/// `[min_key, max_key]`.
///
/// An empty key list is a caller contract violation; it yields the empty
/// region so a violating call declines everywhere.
pub fn region_from_keys<'a>(keys: impl Iterator<Item = &'a StoreKey>) -> Region {
    let mut min_key: Option<&StoreKey> = None;
    let mut max_key: Option<&StoreKey> = None;
    let mut min_hash = u64::MAX;
    let mut max_hash = 0u64;

    for key in keys {
        if min_key.map_or(true, |m| key < m) {
            min_key = Some(key);
        }
        if max_key.map_or(true, |m| key > m) {
            max_key = Some(key);
        }
        let h = key_hash(key);
        min_hash = min_hash.min(h);
        max_hash = max_hash.max(h);
    }

    match (min_key, max_key) {
        (Some(min_key), Some(max_key)) => Region::new(
            HashRange::new(min_hash, max_hash + 1),
            KeyRange::new(
                KeyBound::Closed {
                    key: min_key.clone(),
                },
                KeyBound::Closed {
                    key: max_key.clone(),
                },
            ),
        ),
        // An empty key list is a caller contract violation; the empty
        // region makes a violating call decline on every shard.
        _ => Region::new(HashRange::new(0, 0), KeyRange::universe()),
    }
}
