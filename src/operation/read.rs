//! Read operations and their region extraction
//!
//! Every read is a tagged variant plus a profiling flag. The tag order
//! is the wire discriminator order and must not be reshuffled; composite
//! reads are cluster-only shapes with no cross-version compatibility
//! duty.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::region::{Region, StoreKey};

use super::batch::BatchSpec;
use super::index::IndexRangeSpec;
use super::profile::Profile;
use super::sort::Sorting;

/// A mailbox address a changefeed client listens on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FeedAddr {
    /// The server hosting the mailbox.
    pub peer: Uuid,
    /// Mailbox number on that server.
    pub mailbox: u64,
}

/// A final aggregation applied to a range read.
///
/// Each shard computes a partial aggregate; the unsharder folds the
/// partials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "terminal", rename_all = "snake_case")]
pub enum Terminal {
    Count,
    Sum { field: String },
    Avg { field: String },
}

/// A logical read, as dispatched by the query layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Read {
    pub op: ReadOp,
    pub profile: Profile,
}

impl Read {
    pub fn new(op: ReadOp) -> Self {
        Read {
            op,
            profile: Profile::Disabled,
        }
    }

    pub fn with_profile(op: ReadOp, profile: Profile) -> Self {
        Read { op, profile }
    }

    /// The region of key space this read touches.
    pub fn region(&self) -> Region {
        self.op.region()
    }
}

/// The read variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReadOp {
    /// Fetch one row by key.
    PointRead { key: StoreKey },
    /// Stream rows of a region, optionally through an index, with a sort
    /// order, opaque transforms, and an optional terminal aggregate.
    RangeRead {
        region: Region,
        sorting: Sorting,
        transforms: Vec<Value>,
        terminal: Option<Terminal>,
        index: Option<IndexRangeSpec>,
        batch: BatchSpec,
    },
    /// All rows whose geo-indexed geometry intersects the query geometry.
    GeoIntersect {
        region: Region,
        geometry: Value,
        index_id: Uuid,
    },
    /// The nearest geo-indexed rows to a center point, by ascending
    /// distance.
    GeoNearest {
        region: Region,
        center: Value,
        max_dist: f64,
        max_results: u64,
        index_id: Uuid,
    },
    /// A depth-bounded histogram of key density over a region.
    DistributionRead {
        region: Region,
        max_depth: u32,
        result_limit: usize,
    },
    /// Names of all secondary indexes on the table.
    IndexList,
    /// Build state of the named secondary indexes; an empty set means
    /// every index.
    IndexStatus {
        names: BTreeSet<String>,
        region: Region,
    },
    /// Register a changefeed client for a region.
    ChangefeedSubscribe { addr: FeedAddr, region: Region },
    /// Read the current changefeed stamps for a region.
    ChangefeedStamp { addr: FeedAddr, region: Region },
    /// Read the stamp and current value for one key.
    ChangefeedPointStamp { addr: FeedAddr, key: StoreKey },
}

impl ReadOp {
    /// The region of key space this read touches.
    ///
    /// Keyed variants touch exactly their key's monokey region; the
    /// index-list variant uses the monokey region of the empty key as a
    /// canonical rendezvous so exactly one shard answers it.
    pub fn region(&self) -> Region {
        match self {
            ReadOp::PointRead { key } => Region::monokey(key),
            ReadOp::RangeRead { region, .. } => region.clone(),
            ReadOp::GeoIntersect { region, .. } => region.clone(),
            ReadOp::GeoNearest { region, .. } => region.clone(),
            ReadOp::DistributionRead { region, .. } => region.clone(),
            ReadOp::IndexList => Region::monokey(&index_list_region_key()),
            ReadOp::IndexStatus { region, .. } => region.clone(),
            ReadOp::ChangefeedSubscribe { region, .. } => region.clone(),
            ReadOp::ChangefeedStamp { region, .. } => region.clone(),
            ReadOp::ChangefeedPointStamp { key, .. } => Region::monokey(key),
        }
    }

    /// Operation name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            ReadOp::PointRead { .. } => "point_read",
            ReadOp::RangeRead { .. } => "range_read",
            ReadOp::GeoIntersect { .. } => "geo_intersect",
            ReadOp::GeoNearest { .. } => "geo_nearest",
            ReadOp::DistributionRead { .. } => "distribution_read",
            ReadOp::IndexList => "index_list",
            ReadOp::IndexStatus { .. } => "index_status",
            ReadOp::ChangefeedSubscribe { .. } => "changefeed_subscribe",
            ReadOp::ChangefeedStamp { .. } => "changefeed_stamp",
            ReadOp::ChangefeedPointStamp { .. } => "changefeed_point_stamp",
        }
    }
}

/// The key identifying the rendezvous region for index-list reads.
pub fn index_list_region_key() -> StoreKey {
    StoreKey::min()
}
