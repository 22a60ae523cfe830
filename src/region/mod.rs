//! Region algebra for hash/key sharding
//!
//! Keys, key ranges, hash intervals, and their product regions, plus the
//! value-space ranges used by secondary-index queries. Everything here is
//! a plain value: created on dispatch, destroyed on return, never aware
//! of storage.

mod datum_range;
mod key;
mod range;
mod region;

pub use datum_range::{DatumBound, DatumRange};
pub use key::{
    datum_cmp, encode_primary, encode_secondary_truncated, key_hash, successor_key, StoreKey,
    MAX_KEY_BYTES, MAX_SECONDARY_KEY_BYTES,
};
pub use range::{KeyBound, KeyRange};
pub use region::{cpu_shard, HashRange, Region, HASH_SPAN};
