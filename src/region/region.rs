//! Hash-interval × key-range regions
//!
//! A region is the product of a half-open interval on the 64-bit hash
//! axis and a key range. Every shard of a table owns one region; every
//! operation carries the region it targets.

use serde::{Deserialize, Serialize};

use super::key::{key_hash, StoreKey};
use super::range::KeyRange;

/// Exclusive upper bound of the hash axis. `key_hash` never reaches it.
pub const HASH_SPAN: u64 = u64::MAX;

/// A half-open interval `[beg, end)` on the hash axis.
///
/// `beg <= end` always; equality denotes the empty interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HashRange {
    pub beg: u64,
    pub end: u64,
}

impl HashRange {
    pub fn new(beg: u64, end: u64) -> Self {
        debug_assert!(beg <= end, "hash range inverted: [{beg}, {end})");
        HashRange { beg, end }
    }

    pub fn universe() -> Self {
        HashRange {
            beg: 0,
            end: HASH_SPAN,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.beg == self.end
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.beg <= hash && hash < self.end
    }

    pub fn intersect(&self, other: &HashRange) -> HashRange {
        let beg = self.beg.max(other.beg);
        let end = self.end.min(other.end);
        HashRange {
            beg,
            end: end.max(beg),
        }
    }
}

/// The product of a hash interval and a key range.
///
/// Ordering is lexicographic with the key range first, then the hash
/// interval; it exists only so distribution merges can group and sort
/// per-shard responses deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub hash_range: HashRange,
    pub key_range: KeyRange,
}

impl Region {
    pub fn new(hash_range: HashRange, key_range: KeyRange) -> Self {
        Region {
            hash_range,
            key_range,
        }
    }

    /// The region covering the whole table: `[0, HASH_SPAN) x (-inf, +inf)`.
    pub fn universe() -> Self {
        Region {
            hash_range: HashRange::universe(),
            key_range: KeyRange::universe(),
        }
    }

    /// The region containing exactly `key`: a width-1 hash interval over
    /// a closed-closed singleton key range.
    pub fn monokey(key: &StoreKey) -> Self {
        let h = key_hash(key);
        Region {
            hash_range: HashRange::new(h, h + 1),
            key_range: KeyRange::singleton(key.clone()),
        }
    }

    /// A region is empty iff either component is empty.
    pub fn is_empty(&self) -> bool {
        self.hash_range.is_empty() || self.key_range.is_empty()
    }

    /// Component-wise intersection; may be empty.
    pub fn intersect(&self, other: &Region) -> Region {
        Region {
            hash_range: self.hash_range.intersect(&other.hash_range),
            key_range: self.key_range.intersect(&other.key_range),
        }
    }

    /// Whether the region holds `key`: its hash falls in the hash
    /// interval and the key falls in the key range.
    pub fn contains_key(&self, key: &StoreKey) -> bool {
        self.hash_range.contains(key_hash(key)) && self.key_range.contains(key)
    }

    /// Whether every key of `other` lies in `self`.
    pub fn contains_region(&self, other: &Region) -> bool {
        if other.is_empty() {
            return true;
        }
        self.hash_range.beg <= other.hash_range.beg
            && self.hash_range.end >= other.hash_range.end
            && self.key_range.contains_range(&other.key_range)
    }
}

impl PartialOrd for Region {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Region {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key_range
            .cmp(&other.key_range)
            .then_with(|| self.hash_range.cmp(&other.hash_range))
    }
}

/// The `index`-th of `count` equal-width hash subranges covering the
/// whole axis over the full key space.
///
/// The final shard absorbs the division remainder so the union of all
/// `count` shards is exactly the universe.
pub fn cpu_shard(index: usize, count: usize) -> Region {
    debug_assert!(count > 0);
    debug_assert!(index < count);

    let width = HASH_SPAN / count as u64;
    let beg = width * index as u64;
    let end = if index + 1 == count {
        HASH_SPAN
    } else {
        beg + width
    };
    Region::new(HashRange::new(beg, end), KeyRange::universe())
}
