//! Content hashing for cache keys.
//!
//! [`content_hash`] reduces nested [`Value`]s to a canonical byte encoding and
//! digests it with XXH3-128. Scalars are stringified, mapping keys are sorted
//! and sequences are sorted whenever their elements are mutually orderable,
//! so logically equal arguments produce the same cache key regardless of the
//! order they were built in.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::HashingError;
use crate::value::Value;

/// A 128-bit content hash computed using XXH3.
///
/// Two values with the same `ContentHash` are assumed to be identical. The
/// hash is stable across runs and platforms, but carries no security
/// guarantees.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Sentinel hash given to unhashable data in lossy mode.
    pub const ZERO: ContentHash = ContentHash([0; 16]);

    /// Computes a content hash from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Wraps a raw 128-bit value.
    pub fn from_u128(value: u128) -> Self {
        Self(value.to_le_bytes())
    }

    /// Returns the hash as an integer.
    pub fn as_u128(&self) -> u128 {
        u128::from_le_bytes(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// Hashes a value, failing on any [`Value::Unhashable`] part.
pub fn content_hash(value: &Value) -> Result<ContentHash, HashingError> {
    hash_value(value, false)
}

/// Hashes a value, giving unhashable parts the sentinel [`ContentHash::ZERO`].
///
/// Trades collision risk for robustness: every unhashable part hashes the
/// same.
pub fn content_hash_lossy(value: &Value) -> ContentHash {
    // Lossy mode never produces an error.
    hash_value(value, true).unwrap_or(ContentHash::ZERO)
}

fn hash_value(value: &Value, lossy: bool) -> Result<ContentHash, HashingError> {
    match value {
        Value::Null => Ok(hash_str("null")),
        Value::Bool(b) => Ok(hash_str(if *b { "true" } else { "false" })),
        Value::Int(n) => Ok(hash_str(&n.to_string())),
        Value::UInt(n) => Ok(hash_str(&n.to_string())),
        Value::Float(f) => Ok(hash_str(&f.to_string())),
        Value::Str(s) => Ok(hash_str(s)),
        Value::Map(map) => {
            let mut canonical = BTreeMap::new();
            for (key, child) in map {
                canonical.insert(key.as_str(), hash_value(child, lossy)?.as_u128().to_string());
            }
            Ok(hash_canonical(&canonical))
        }
        Value::Seq(items) => {
            let canonical = sorted_if_orderable(items)
                .into_iter()
                .map(|child| hash_value(child, lossy).map(|h| h.as_u128().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(hash_canonical(&canonical))
        }
        Value::Unhashable(_) if lossy => Ok(ContentHash::ZERO),
        Value::Unhashable(what) => Err(HashingError::Unhashable { what: what.clone() }),
    }
}

fn hash_str(s: &str) -> ContentHash {
    ContentHash::from_bytes(s.as_bytes())
}

fn hash_canonical<T: Serialize>(canonical: &T) -> ContentHash {
    // Maps with string keys and lists of strings always serialize.
    let encoded = serde_json::to_vec(canonical).unwrap_or_default();
    ContentHash::from_bytes(&encoded)
}

/// Returns the elements sorted, or in their original order if any pair of
/// neighbours turned out not to be orderable.
fn sorted_if_orderable(items: &[Value]) -> Vec<&Value> {
    let mut sorted: Vec<&Value> = items.iter().collect();
    sorted.sort_by(|a, b| total_cmp(a, b));
    if sorted.windows(2).all(|pair| pair[0].try_cmp(pair[1]).is_some()) {
        sorted
    } else {
        items.iter().collect()
    }
}

/// A total order over all values, refining [`Value::try_cmp`] wherever
/// that is defined.
fn total_cmp(a: &Value, b: &Value) -> Ordering {
    rank(a).cmp(&rank(b)).then_with(|| match (a, b) {
        (Value::Str(x), Value::Str(y)) | (Value::Unhashable(x), Value::Unhashable(y)) => x.cmp(y),
        (Value::Seq(x), Value::Seq(y)) => x
            .iter()
            .zip(y)
            .map(|(p, q)| total_cmp(p, q))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Map(x), Value::Map(y)) => x
            .iter()
            .zip(y)
            .map(|((kp, vp), (kq, vq))| kp.cmp(kq).then_with(|| total_cmp(vp, vq)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => match (numeric_key(a), numeric_key(b)) {
            (Some((fa, ea, ta)), Some((fb, eb, tb))) => fa
                .total_cmp(&fb)
                .then(ea.cmp(&eb))
                .then(ta.cmp(&tb)),
            _ => Ordering::Equal,
        },
    })
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) | Value::Int(_) | Value::UInt(_) | Value::Float(_) => 1,
        Value::Str(_) => 2,
        Value::Seq(_) => 3,
        Value::Map(_) => 4,
        Value::Unhashable(_) => 5,
    }
}

/// `(approximate value, exact value, variant)` for numbers and booleans.
fn numeric_key(value: &Value) -> Option<(f64, Option<i128>, u8)> {
    match value {
        Value::Bool(b) => Some((f64::from(u8::from(*b)), Some(i128::from(*b)), 0)),
        Value::Int(n) => Some((*n as f64, Some(i128::from(*n)), 1)),
        Value::UInt(n) => Some((*n as f64, Some(i128::from(*n)), 2)),
        Value::Float(f) => Some((*f, None, 3)),
        _ => None,
    }
}
