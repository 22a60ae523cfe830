//! Store keys and the primary/secondary key encodings
//!
//! A `StoreKey` is the byte-string form of a document's primary key as it
//! appears in the primary tree. Keys order bytewise. The hash position of a
//! key on the 64-bit hash axis is stable across processes and
//! architectures.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Maximum length of a stored key in bytes.
pub const MAX_KEY_BYTES: usize = 250;

/// Secondary index entries truncate the encoded value to this many bytes.
pub const MAX_SECONDARY_KEY_BYTES: usize = 64;

/// A primary-tree key: an owned byte string ordered bytewise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreKey(Vec<u8>);

impl StoreKey {
    /// Creates a key from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        StoreKey(bytes.into())
    }

    /// The minimum key: the empty byte string.
    pub fn min() -> Self {
        StoreKey(Vec::new())
    }

    /// The maximum key sentinel: `MAX_KEY_BYTES` bytes of 0xFF.
    ///
    /// Valid document keys are strictly shorter, so this compares greater
    /// than every key that can appear in the primary tree.
    pub fn max() -> Self {
        StoreKey(vec![0xFF; MAX_KEY_BYTES])
    }

    /// The key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is the empty (minimum) key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for StoreKey {
    fn from(s: &str) -> Self {
        StoreKey(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for StoreKey {
    fn from(b: &[u8]) -> Self {
        StoreKey(b.to_vec())
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            if byte.is_ascii_graphic() {
                write!(f, "{}", *byte as char)?;
            } else {
                write!(f, "\\x{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

/// Positions a key on the hash axis.
///
/// First 8 bytes of SHA-256 of the key bytes, big-endian. The result is
/// clamped below `u64::MAX` so the hash axis is exactly `[0, u64::MAX)`
/// and the universe region covers every key.
pub fn key_hash(key: &StoreKey) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    let h = u64::from_be_bytes(buf);
    if h == u64::MAX {
        h - 1
    } else {
        h
    }
}

// Type tags for the total-order key encoding. Null < Bool < Number <
// String < Array < Object, matching the document sort order.
const TAG_NULL: u8 = 0x01;
const TAG_FALSE: u8 = 0x02;
const TAG_TRUE: u8 = 0x03;
const TAG_NUMBER: u8 = 0x04;
const TAG_STRING: u8 = 0x05;
const TAG_ARRAY: u8 = 0x06;
const TAG_OBJECT: u8 = 0x07;

// Strings embed a terminator so "a" sorts before "ab"; NUL bytes inside
// the string are escaped to keep the terminator unambiguous.
const STR_ESCAPE: [u8; 2] = [0x00, 0xFF];
const STR_TERMINATOR: [u8; 2] = [0x00, 0x01];

/// Encodes a document value into the order-preserving primary key form.
///
/// For any two values `a < b` under the document sort order,
/// `encode_primary(a) < encode_primary(b)` bytewise.
pub fn encode_primary(value: &Value) -> StoreKey {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    StoreKey(out)
}

fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(false) => out.push(TAG_FALSE),
        Value::Bool(true) => out.push(TAG_TRUE),
        Value::Number(n) => {
            out.push(TAG_NUMBER);
            let f = n.as_f64().unwrap_or(0.0);
            out.extend_from_slice(&order_preserving_bits(f).to_be_bytes());
        }
        Value::String(s) => {
            out.push(TAG_STRING);
            for byte in s.as_bytes() {
                if *byte == 0x00 {
                    out.extend_from_slice(&STR_ESCAPE);
                } else {
                    out.push(*byte);
                }
            }
            out.extend_from_slice(&STR_TERMINATOR);
        }
        Value::Array(items) => {
            out.push(TAG_ARRAY);
            for item in items {
                encode_into(item, out);
            }
            out.extend_from_slice(&STR_TERMINATOR);
        }
        Value::Object(map) => {
            // Object keys sort in map order; serde_json's map preserves a
            // deterministic order for a given document.
            out.push(TAG_OBJECT);
            for (k, v) in map {
                encode_into(&Value::String(k.clone()), out);
                encode_into(v, out);
            }
            out.extend_from_slice(&STR_TERMINATOR);
        }
    }
}

/// Maps f64 bits to a monotonically ordered u64.
///
/// Negative values flip all bits, non-negative values flip the sign bit,
/// giving an unsigned comparison that agrees with numeric order.
fn order_preserving_bits(v: f64) -> u64 {
    let bits = v.to_bits();
    if (bits >> 63) == 1 {
        !bits
    } else {
        bits ^ (1 << 63)
    }
}

/// Encodes a value into the truncated secondary-index key form.
///
/// Identical to the primary encoding but capped at
/// `MAX_SECONDARY_KEY_BYTES`; two values sharing a truncated prefix
/// collide in the index and are disambiguated by the primary key, which
/// the storage layer appends outside this encoding.
pub fn encode_secondary_truncated(value: &Value) -> StoreKey {
    let mut key = encode_primary(value);
    key.0.truncate(MAX_SECONDARY_KEY_BYTES);
    key
}

/// The successor of `key` that does not lengthen it.
///
/// Strips trailing 0xFF bytes, then increments the last remaining byte.
/// If every byte strips away the result is the maximum key sentinel.
/// Used to convert a closed right bound into an open one in secondary
/// key space: every key strictly between `key` and the successor shares
/// `key`'s truncated prefix.
pub fn successor_key(key: &StoreKey) -> StoreKey {
    let mut bytes = key.as_bytes().to_vec();
    while let Some(&last) = bytes.last() {
        if last == 0xFF {
            bytes.pop();
        } else {
            break;
        }
    }
    match bytes.last_mut() {
        Some(last) => {
            *last += 1;
            StoreKey(bytes)
        }
        None => StoreKey::max(),
    }
}

/// Total order over document values: null < bool < number < string <
/// array < object, with natural ordering inside each type.
pub fn datum_cmp(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    fn type_rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let xf = x.as_f64().unwrap_or(0.0);
            let yf = y.as_f64().unwrap_or(0.0);
            xf.partial_cmp(&yf).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xe, ye) in x.iter().zip(y.iter()) {
                let ord = datum_cmp(xe, ye);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            let mut xk: Vec<_> = x.iter().collect();
            let mut yk: Vec<_> = y.iter().collect();
            xk.sort_by(|(k1, _), (k2, _)| k1.cmp(k2));
            yk.sort_by(|(k1, _), (k2, _)| k1.cmp(k2));
            for ((k1, v1), (k2, v2)) in xk.iter().zip(yk.iter()) {
                let ord = k1.cmp(k2).then_with(|| datum_cmp(v1, v2));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            xk.len().cmp(&yk.len())
        }
        _ => Ordering::Equal,
    }
}
