//! The operation model
//!
//! Tagged read and write variants, their responses, and the attachments
//! they carry: batch specs, sort orders, index metadata, and profiling
//! flags. Each variant knows the region of key space it touches; the
//! sharding layer is dispatched on the variant tag and never needs
//! dynamic dispatch.

mod backfill;
mod batch;
mod index;
mod profile;
mod read;
mod response;
mod sort;
mod write;

pub use backfill::{BackfillAtom, BackfillChunk, RangeKeyTester};
pub use batch::{BatchSpec, CPU_SHARDING_FACTOR};
pub use index::{IndexDefinition, IndexRangeSpec, IndexStatus};
pub use profile::{Profile, ProfileEvent};
pub use read::{index_list_region_key, FeedAddr, Read, ReadOp, Terminal};
pub use response::{
    ChangefeedStampResponse, ChangefeedSubscribeResponse, DistributionResponse, IndexRenameResult,
    NearestHit, PointDeleteResult, PointWriteResult, QueryError, RangePayload, RangeReadResponse,
    ReadResponse, ReadResponsePayload, Row, WriteResponse, WriteResponsePayload,
};
pub use sort::Sorting;
pub use write::{
    insert_row_key, region_from_keys, ConflictBehavior, Durability, Limits, Write, WriteOp,
};
