//! Response shapes for reads and writes
//!
//! Every response carries its variant payload plus two universal tail
//! fields: a profiling event log and a shard count. Both stay empty/zero
//! unless the originating operation enabled profiling.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::region::{KeyRange, Region, StoreKey};

use super::index::IndexStatus;
use super::profile::ProfileEvent;
use super::read::FeedAddr;

/// A user-level error produced while executing an operation on a shard,
/// e.g. a type mismatch in a terminal. Travels inside the response
/// payload; merge paths surface the first one and stop merging.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        QueryError {
            message: message.into(),
        }
    }
}

/// One row of a range read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub key: StoreKey,
    pub value: Value,
}

/// The data portion of a range-read response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePayload {
    /// Rows in the operation's sort order.
    Rows(Vec<Row>),
    /// A terminal's partial (per-shard) or final (composed) aggregate.
    Aggregate(Value),
}

/// Response to a range read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeReadResponse {
    pub result: Result<RangePayload, QueryError>,
    /// Whether the batch spec cut the stream short.
    pub truncated: bool,
    /// The continuation cursor: the last key this response covers. When
    /// not truncated this is the sort-max sentinel.
    pub last_key: StoreKey,
    /// The key range this response covers.
    pub key_range: KeyRange,
}

/// One result of a geo-nearest read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestHit {
    pub distance: f64,
    pub doc: Value,
}

/// Response to a distribution read: a histogram of key counts over one
/// shard's region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionResponse {
    pub region: Region,
    pub key_counts: BTreeMap<StoreKey, u64>,
}

/// Response to a changefeed subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangefeedSubscribeResponse {
    pub server_uuids: BTreeSet<Uuid>,
    pub addrs: BTreeSet<FeedAddr>,
}

/// Response to a changefeed stamp read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangefeedStampResponse {
    pub stamps: BTreeMap<Uuid, u64>,
}

/// The read response variants, mirroring [`super::read::ReadOp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum ReadResponsePayload {
    /// The row, or null when absent.
    PointRead { data: Value },
    RangeRead(RangeReadResponse),
    GeoIntersect {
        result: Result<Vec<Value>, QueryError>,
    },
    GeoNearest {
        result: Result<Vec<NearestHit>, QueryError>,
    },
    Distribution(DistributionResponse),
    IndexList { indexes: Vec<String> },
    IndexStatus {
        statuses: BTreeMap<String, IndexStatus>,
    },
    ChangefeedSubscribe(ChangefeedSubscribeResponse),
    ChangefeedStamp(ChangefeedStampResponse),
    ChangefeedPointStamp {
        stamp: u64,
        initial_val: Option<Value>,
    },
}

/// A composed or per-shard read response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub payload: ReadResponsePayload,
    pub event_log: Vec<ProfileEvent>,
    pub n_shards: u32,
}

impl ReadResponse {
    pub fn new(payload: ReadResponsePayload) -> Self {
        ReadResponse {
            payload,
            event_log: Vec::new(),
            n_shards: 0,
        }
    }
}

/// Outcome of a point write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointWriteResult {
    Stored,
    Duplicate,
}

/// Outcome of a point delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointDeleteResult {
    Deleted,
    Missing,
}

/// Outcome of an index rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexRenameResult {
    Renamed,
    SourceMissing,
    TargetExists,
}

/// The write response variants, mirroring [`super::write::WriteOp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum WriteResponsePayload {
    /// Statistics object for a batched replace or insert.
    Batched { stats: Value },
    PointWrite { result: PointWriteResult },
    PointDelete { result: PointDeleteResult },
    IndexCreate { success: bool },
    IndexDrop { success: bool },
    IndexRename { result: IndexRenameResult },
    Sync,
}

/// A composed or per-shard write response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub payload: WriteResponsePayload,
    pub event_log: Vec<ProfileEvent>,
    pub n_shards: u32,
}

impl WriteResponse {
    pub fn new(payload: WriteResponsePayload) -> Self {
        WriteResponse {
            payload,
            event_log: Vec::new(),
            n_shards: 0,
        }
    }
}
