//! Value-space ranges for secondary-index queries
//!
//! A datum range bounds document *values* rather than stored keys. It is
//! converted to key space in two ways: the primary conversion serializes
//! each bound with the primary encoding, the secondary conversion uses
//! the truncated secondary encoding and widens the right bound to the
//! successor key so that truncation collisions stay inside the range.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::key::{
    datum_cmp, encode_primary, encode_secondary_truncated, successor_key, StoreKey,
};
use super::range::{KeyBound, KeyRange};

/// One side of a datum range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "bound", rename_all = "snake_case")]
pub enum DatumBound {
    Unbounded,
    Closed { value: Value },
    Open { value: Value },
}

impl DatumBound {
    pub fn value(&self) -> Option<&Value> {
        match self {
            DatumBound::Unbounded => None,
            DatumBound::Closed { value } | DatumBound::Open { value } => Some(value),
        }
    }
}

/// A range over document values with independent bound types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatumRange {
    pub left: DatumBound,
    pub right: DatumBound,
}

impl DatumRange {
    pub fn new(left: DatumBound, right: DatumBound) -> Self {
        DatumRange { left, right }
    }

    /// The range containing every value.
    pub fn universe() -> Self {
        DatumRange {
            left: DatumBound::Unbounded,
            right: DatumBound::Unbounded,
        }
    }

    /// The range containing exactly `value`.
    pub fn singleton(value: Value) -> Self {
        DatumRange {
            left: DatumBound::Closed {
                value: value.clone(),
            },
            right: DatumBound::Closed { value },
        }
    }

    pub fn is_universe(&self) -> bool {
        matches!(self.left, DatumBound::Unbounded) && matches!(self.right, DatumBound::Unbounded)
    }

    /// The natural interval test, respecting bound openness on each side.
    pub fn contains(&self, value: &Value) -> bool {
        use std::cmp::Ordering;

        let left_ok = match &self.left {
            DatumBound::Unbounded => true,
            DatumBound::Closed { value: l } => datum_cmp(l, value) != Ordering::Greater,
            DatumBound::Open { value: l } => datum_cmp(l, value) == Ordering::Less,
        };
        let right_ok = match &self.right {
            DatumBound::Unbounded => true,
            DatumBound::Closed { value: r } => datum_cmp(r, value) != Ordering::Less,
            DatumBound::Open { value: r } => datum_cmp(r, value) == Ordering::Greater,
        };
        left_ok && right_ok
    }

    /// Serializes both bounds with the primary key encoding, preserving
    /// bound types. Unbounded sides become the min/max key.
    pub fn to_primary_key_range(&self) -> KeyRange {
        let left = match &self.left {
            DatumBound::Unbounded => KeyBound::Closed {
                key: StoreKey::min(),
            },
            DatumBound::Closed { value } => KeyBound::Closed {
                key: encode_primary(value),
            },
            DatumBound::Open { value } => KeyBound::Open {
                key: encode_primary(value),
            },
        };
        let right = match &self.right {
            DatumBound::Unbounded => KeyBound::Closed {
                key: StoreKey::max(),
            },
            DatumBound::Closed { value } => KeyBound::Closed {
                key: encode_primary(value),
            },
            DatumBound::Open { value } => KeyBound::Open {
                key: encode_primary(value),
            },
        };
        KeyRange::new(left, right)
    }

    /// Serializes both bounds with the truncated secondary encoding.
    ///
    /// The right bound is replaced by its length-non-increasing successor
    /// and becomes open: any value whose truncated encoding shares the
    /// right bound's prefix still falls below the successor, so no index
    /// entry inside the range is lost to truncation.
    pub fn to_secondary_key_range(&self) -> KeyRange {
        let left = match self.left.value() {
            None => KeyBound::Closed {
                key: StoreKey::min(),
            },
            Some(value) => KeyBound::Closed {
                key: encode_secondary_truncated(value),
            },
        };
        let right = match self.right.value() {
            None => KeyBound::Open {
                key: StoreKey::max(),
            },
            Some(value) => KeyBound::Open {
                key: successor_key(&encode_secondary_truncated(value)),
            },
        };
        KeyRange::new(left, right)
    }
}
