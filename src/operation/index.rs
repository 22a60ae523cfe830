//! Secondary-index metadata shared by operations, responses, and the
//! post-construction engine

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::region::{DatumRange, Region};

/// The definition of a secondary index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// User-visible index name, unique per table.
    pub name: String,
    /// Stable id; survives renames.
    pub id: Uuid,
    /// The index function, carried as an opaque wire term. The storage
    /// layer evaluates it; the core only routes it.
    pub mapping: Value,
    /// Whether one row may produce multiple index entries.
    pub multi: bool,
    /// Whether entries are geospatial.
    pub geo: bool,
}

/// A secondary-index restriction on a range read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRangeSpec {
    /// The index to read from.
    pub index_id: Uuid,
    /// The index-key-space region of the read.
    pub region: Region,
    /// The value-space range the caller asked for, kept alongside the
    /// encoded region so shards can re-check truncation collisions.
    pub original_range: DatumRange,
}

/// One shard's view of one index's build state.
///
/// Across the shards of a single index, `definition`, `geo`, `multi`,
/// and `outdated` are identical; the counters are additive and `ready`
/// is the conjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Primary-tree blocks already scanned by post-construction.
    pub blocks_processed: u64,
    /// Total primary-tree blocks to scan.
    pub blocks_total: u64,
    /// Whether the index is fully built on this shard.
    pub ready: bool,
    /// The index function, as stored.
    pub definition: Value,
    /// Whether entries are geospatial.
    pub geo: bool,
    /// Whether one row may produce multiple entries.
    pub multi: bool,
    /// Whether the definition predates the current encoding and needs a
    /// rebuild.
    pub outdated: bool,
}

impl IndexStatus {
    /// Folds another shard's status into this one: counters add, `ready`
    /// ANDs, and the definition fields carry over unchanged since every
    /// shard agrees on them.
    pub fn add(&mut self, other: &IndexStatus) {
        self.blocks_processed += other.blocks_processed;
        self.blocks_total += other.blocks_total;
        self.ready &= other.ready;
        self.definition = other.definition.clone();
        self.geo = other.geo;
        self.multi = other.multi;
        self.outdated = other.outdated;
    }

    /// The identity of the fold: zero counters, `ready` true.
    pub fn empty() -> Self {
        IndexStatus {
            blocks_processed: 0,
            blocks_total: 0,
            ready: true,
            definition: Value::Null,
            geo: false,
            multi: false,
            outdated: false,
        }
    }
}
