//! Key ranges with independently open, closed, or unbounded sides

use serde::{Deserialize, Serialize};

use super::key::StoreKey;

/// One side of a key range.
///
/// The derived ordering (`Unbounded` < `Closed` < `Open`, then key bytes)
/// is arbitrary but total; ranges only need it for deterministic grouping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "bound", rename_all = "snake_case")]
pub enum KeyBound {
    Unbounded,
    Closed { key: StoreKey },
    Open { key: StoreKey },
}

impl KeyBound {
    pub fn closed(key: impl Into<StoreKey>) -> Self {
        KeyBound::Closed { key: key.into() }
    }

    pub fn open(key: impl Into<StoreKey>) -> Self {
        KeyBound::Open { key: key.into() }
    }

    pub fn key(&self) -> Option<&StoreKey> {
        match self {
            KeyBound::Unbounded => None,
            KeyBound::Closed { key } | KeyBound::Open { key } => Some(key),
        }
    }
}

/// A contiguous range of store keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyRange {
    pub left: KeyBound,
    pub right: KeyBound,
}

impl KeyRange {
    pub fn new(left: KeyBound, right: KeyBound) -> Self {
        KeyRange { left, right }
    }

    /// The range containing every key.
    pub fn universe() -> Self {
        KeyRange {
            left: KeyBound::Unbounded,
            right: KeyBound::Unbounded,
        }
    }

    /// The range containing exactly `key`.
    pub fn singleton(key: StoreKey) -> Self {
        KeyRange {
            left: KeyBound::Closed { key: key.clone() },
            right: KeyBound::Closed { key },
        }
    }

    /// Whether no key satisfies both bounds.
    pub fn is_empty(&self) -> bool {
        let (l, r) = match (self.left.key(), self.right.key()) {
            (Some(l), Some(r)) => (l, r),
            _ => return false,
        };
        if l > r {
            return true;
        }
        if l == r {
            // A degenerate range holds its key only when both sides close.
            return !(matches!(self.left, KeyBound::Closed { .. })
                && matches!(self.right, KeyBound::Closed { .. }));
        }
        false
    }

    /// Whether `key` lies inside the range.
    pub fn contains(&self, key: &StoreKey) -> bool {
        let left_ok = match &self.left {
            KeyBound::Unbounded => true,
            KeyBound::Closed { key: l } => key >= l,
            KeyBound::Open { key: l } => key > l,
        };
        let right_ok = match &self.right {
            KeyBound::Unbounded => true,
            KeyBound::Closed { key: r } => key <= r,
            KeyBound::Open { key: r } => key < r,
        };
        left_ok && right_ok
    }

    /// Component-wise intersection: the tighter bound wins on each side.
    pub fn intersect(&self, other: &KeyRange) -> KeyRange {
        KeyRange {
            left: tighter_left(&self.left, &other.left).clone(),
            right: tighter_right(&self.right, &other.right).clone(),
        }
    }

    /// Whether every key of `other` lies inside `self`.
    pub fn contains_range(&self, other: &KeyRange) -> bool {
        if other.is_empty() {
            return true;
        }
        let left_ok = match (&self.left, &other.left) {
            (KeyBound::Unbounded, _) => true,
            (_, KeyBound::Unbounded) => false,
            (KeyBound::Closed { key: a }, KeyBound::Closed { key: b })
            | (KeyBound::Closed { key: a }, KeyBound::Open { key: b })
            | (KeyBound::Open { key: a }, KeyBound::Open { key: b }) => a <= b,
            (KeyBound::Open { key: a }, KeyBound::Closed { key: b }) => a < b,
        };
        let right_ok = match (&self.right, &other.right) {
            (KeyBound::Unbounded, _) => true,
            (_, KeyBound::Unbounded) => false,
            (KeyBound::Closed { key: a }, KeyBound::Closed { key: b })
            | (KeyBound::Closed { key: a }, KeyBound::Open { key: b })
            | (KeyBound::Open { key: a }, KeyBound::Open { key: b }) => a >= b,
            (KeyBound::Open { key: a }, KeyBound::Closed { key: b }) => a > b,
        };
        left_ok && right_ok
    }
}

fn tighter_left<'a>(a: &'a KeyBound, b: &'a KeyBound) -> &'a KeyBound {
    match (a.key(), b.key()) {
        (None, _) => b,
        (_, None) => a,
        (Some(ka), Some(kb)) => {
            if ka > kb {
                a
            } else if kb > ka {
                b
            } else if matches!(a, KeyBound::Open { .. }) {
                a
            } else {
                b
            }
        }
    }
}

fn tighter_right<'a>(a: &'a KeyBound, b: &'a KeyBound) -> &'a KeyBound {
    match (a.key(), b.key()) {
        (None, _) => b,
        (_, None) => a,
        (Some(ka), Some(kb)) => {
            if ka < kb {
                a
            } else if kb < ka {
                b
            } else if matches!(a, KeyBound::Open { .. }) {
                a
            } else {
                b
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_range(l: &str, r: &str) -> KeyRange {
        KeyRange::new(KeyBound::closed(l), KeyBound::closed(r))
    }

    #[test]
    fn test_universe_contains_everything() {
        let u = KeyRange::universe();
        assert!(u.contains(&StoreKey::min()));
        assert!(u.contains(&StoreKey::from("anything")));
        assert!(u.contains(&StoreKey::max()));
        assert!(!u.is_empty());
    }

    #[test]
    fn test_singleton() {
        let r = KeyRange::singleton(StoreKey::from("k"));
        assert!(r.contains(&StoreKey::from("k")));
        assert!(!r.contains(&StoreKey::from("j")));
        assert!(!r.contains(&StoreKey::from("l")));
        assert!(!r.is_empty());
    }

    #[test]
    fn test_open_bounds_exclude_endpoints() {
        let r = KeyRange::new(KeyBound::open("a"), KeyBound::open("c"));
        assert!(!r.contains(&StoreKey::from("a")));
        assert!(r.contains(&StoreKey::from("b")));
        assert!(!r.contains(&StoreKey::from("c")));
    }

    #[test]
    fn test_empty_ranges() {
        assert!(closed_range("m", "a").is_empty());
        assert!(KeyRange::new(KeyBound::closed("a"), KeyBound::open("a")).is_empty());
        assert!(KeyRange::new(KeyBound::open("a"), KeyBound::open("a")).is_empty());
        assert!(!closed_range("a", "a").is_empty());
    }

    #[test]
    fn test_intersect_takes_tighter_bounds() {
        let a = closed_range("a", "m");
        let b = closed_range("g", "z");
        let i = a.intersect(&b);
        assert_eq!(i, closed_range("g", "m"));
    }

    #[test]
    fn test_intersect_open_beats_closed_on_tie() {
        let a = KeyRange::new(KeyBound::closed("a"), KeyBound::closed("m"));
        let b = KeyRange::new(KeyBound::open("a"), KeyBound::open("m"));
        let i = a.intersect(&b);
        assert_eq!(i.left, KeyBound::open("a"));
        assert_eq!(i.right, KeyBound::open("m"));
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let a = closed_range("a", "c");
        let b = closed_range("x", "z");
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn test_contains_range() {
        let outer = closed_range("a", "z");
        let inner = closed_range("c", "f");
        assert!(outer.contains_range(&inner));
        assert!(!inner.contains_range(&outer));
        assert!(KeyRange::universe().contains_range(&outer));
        assert!(outer.contains_range(&closed_range("m", "a")));
    }
}
