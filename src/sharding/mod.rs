//! The sharder and unsharder
//!
//! The sharder restricts a logical operation to one shard; the unsharder
//! composes the per-shard responses back into one response under the
//! operation's ordering, ranking, aggregation, or statistics contract.
//! Both are pure: determinism of the composite response follows from
//! determinism of the per-shard responses.
//!
//! The composition law the two halves maintain together: for any
//! operation and any set of non-overlapping shard regions covering the
//! operation's region, sharding, executing per shard, and unsharding
//! yields the same response as executing the operation directly.

mod accumulator;
mod errors;
mod sharder;
mod unshard_read;
mod unshard_write;

pub use accumulator::{
    Accumulator, AppendAccumulator, AvgAccumulator, CountAccumulator, SumAccumulator,
};
pub use errors::{ShardingError, ShardingResult};
pub use unshard_write::merge_write_stats;
