//! Sort orders for range reads

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::region::StoreKey;

/// The sort attribute of a range read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sorting {
    /// No ordering contract; shards stream in whatever order is cheapest.
    Unordered,
    /// Ascending key order.
    Ascending,
    /// Descending key order.
    Descending,
}

impl Sorting {
    pub fn is_reversed(self) -> bool {
        matches!(self, Sorting::Descending)
    }

    /// The sentinel that compares as "after everything" under this sort:
    /// the maximum key for forward orders, the minimum key when reversed.
    pub fn key_max(self) -> StoreKey {
        if self.is_reversed() {
            StoreKey::min()
        } else {
            StoreKey::max()
        }
    }

    /// Compares two keys under this sort order. `Unordered` compares
    /// ascending so merges stay deterministic.
    pub fn key_cmp(self, a: &StoreKey, b: &StoreKey) -> Ordering {
        if self.is_reversed() {
            b.cmp(a)
        } else {
            a.cmp(b)
        }
    }

    /// Whether `a` comes no later than `b` under this sort order.
    pub fn key_le(self, a: &StoreKey, b: &StoreKey) -> bool {
        self.key_cmp(a, b) != Ordering::Greater
    }
}
