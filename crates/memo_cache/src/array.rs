//! Numeric array format.
//!
//! Stores one rectangular array of numbers, of any rank, without a general
//! object encoding. Any value whose serde form is a (possibly nested) list of
//! numbers with consistent lengths is accepted: `Vec<f64>`,
//! `Vec<Vec<i64>>`, `[[f32; 3]; 2]` and so on. Everything else is rejected
//! with [`CacheError::InvalidArray`].
//!
//! Layout (little-endian): one dtype byte (`i` for `i64`, `f` for `f64`),
//! the rank as `u32`, each dimension as `u64`, then the elements in row-major
//! order as 8-byte values.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;

use crate::error::CacheError;

const DTYPE_INT: u8 = b'i';
const DTYPE_FLOAT: u8 = b'f';

/// Element storage of a [`NumericArray`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    /// All elements are integers representable as `i64`.
    Int(Vec<i64>),
    /// At least one element needed floating point.
    Float(Vec<f64>),
}

impl ArrayData {
    fn len(&self) -> usize {
        match self {
            ArrayData::Int(v) => v.len(),
            ArrayData::Float(v) => v.len(),
        }
    }
}

/// A rectangular, homogeneous array of numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    /// Length of each dimension; empty for a scalar.
    pub shape: Vec<usize>,
    /// Row-major elements.
    pub data: ArrayData,
}

impl NumericArray {
    /// Builds an array from a JSON value, checking it is rectangular and
    /// numeric.
    pub fn from_json(json: &Json) -> Result<Self, CacheError> {
        let shape = infer_shape(json);
        let mut leaves = Vec::new();
        collect_leaves(json, &shape, 0, &mut leaves)?;

        let data = if leaves.iter().all(|n| n.is_i64()) {
            ArrayData::Int(leaves.iter().filter_map(|n| n.as_i64()).collect())
        } else {
            ArrayData::Float(leaves.iter().filter_map(|n| n.as_f64()).collect())
        };
        Ok(Self { shape, data })
    }

    /// Rebuilds the nested JSON form.
    pub fn to_json(&self) -> Result<Json, String> {
        let leaves: Vec<Json> = match &self.data {
            ArrayData::Int(v) => v.iter().map(|n| Json::from(*n)).collect(),
            ArrayData::Float(v) => v
                .iter()
                .map(|f| {
                    serde_json::Number::from_f64(*f)
                        .map(Json::Number)
                        .ok_or_else(|| format!("non-finite element {f}"))
                })
                .collect::<Result<_, _>>()?,
        };
        Ok(nest(&self.shape, &mut leaves.into_iter()))
    }

    /// Encodes the array into its binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + 8 * (self.shape.len() + self.data.len()));
        match &self.data {
            ArrayData::Int(_) => out.push(DTYPE_INT),
            ArrayData::Float(_) => out.push(DTYPE_FLOAT),
        }
        out.extend_from_slice(&(self.shape.len() as u32).to_le_bytes());
        for dim in &self.shape {
            out.extend_from_slice(&(*dim as u64).to_le_bytes());
        }
        match &self.data {
            ArrayData::Int(v) => v.iter().for_each(|n| out.extend_from_slice(&n.to_le_bytes())),
            ArrayData::Float(v) => v.iter().for_each(|f| out.extend_from_slice(&f.to_le_bytes())),
        }
        out
    }

    /// Decodes the binary layout, validating every length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let mut reader = ByteReader { bytes, pos: 0 };
        let dtype = reader.take(1)?[0];
        let rank = u32::from_le_bytes(reader.array()?) as usize;
        let mut shape = Vec::with_capacity(rank.min(64));
        for _ in 0..rank {
            let dim = u64::from_le_bytes(reader.array()?);
            shape.push(usize::try_from(dim).map_err(|_| "dimension too large".to_string())?);
        }
        let count = shape
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))
            .ok_or_else(|| "element count overflows".to_string())?;
        if reader.remaining() != count.saturating_mul(8) {
            return Err(format!(
                "expected {count} elements, found {} bytes of data",
                reader.remaining()
            ));
        }
        let data = match dtype {
            DTYPE_INT => ArrayData::Int(
                (0..count)
                    .map(|_| reader.array().map(i64::from_le_bytes))
                    .collect::<Result<_, _>>()?,
            ),
            DTYPE_FLOAT => ArrayData::Float(
                (0..count)
                    .map(|_| reader.array().map(f64::from_le_bytes))
                    .collect::<Result<_, _>>()?,
            ),
            other => return Err(format!("unknown dtype byte {other:#04x}")),
        };
        Ok(Self { shape, data })
    }
}

/// Serializes `value` as a numeric array.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CacheError> {
    let json = serde_json::to_value(value).map_err(|e| CacheError::InvalidArray {
        reason: e.to_string(),
    })?;
    Ok(NumericArray::from_json(&json)?.to_bytes())
}

/// Deserializes a numeric array read from `path`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], path: &Path) -> Result<T, CacheError> {
    let decode_err = |reason: String| CacheError::Deserialization {
        path: path.to_path_buf(),
        reason,
    };
    let array = NumericArray::from_bytes(bytes).map_err(decode_err)?;
    let json = array.to_json().map_err(decode_err)?;
    serde_json::from_value(json).map_err(|e| decode_err(e.to_string()))
}

/// Follows the first element at each level to find the candidate shape.
fn infer_shape(json: &Json) -> Vec<usize> {
    let mut shape = Vec::new();
    let mut current = json;
    while let Json::Array(items) = current {
        shape.push(items.len());
        match items.first() {
            Some(first) => current = first,
            None => break,
        }
    }
    shape
}

fn collect_leaves<'a>(
    json: &'a Json,
    shape: &[usize],
    depth: usize,
    leaves: &mut Vec<&'a serde_json::Number>,
) -> Result<(), CacheError> {
    let invalid = |reason: String| CacheError::InvalidArray { reason };
    match json {
        Json::Number(n) if depth == shape.len() => {
            leaves.push(n);
            Ok(())
        }
        Json::Array(items) if depth < shape.len() => {
            if items.len() != shape[depth] {
                return Err(invalid(format!(
                    "ragged array: expected length {} at depth {depth}, found {}",
                    shape[depth],
                    items.len()
                )));
            }
            items
                .iter()
                .try_for_each(|item| collect_leaves(item, shape, depth + 1, leaves))
        }
        Json::Array(_) => Err(invalid(format!("ragged array: unexpected list at depth {depth}"))),
        Json::Number(_) => Err(invalid(format!("ragged array: unexpected number at depth {depth}"))),
        other => Err(invalid(format!("non-numeric element {other}"))),
    }
}

fn nest(shape: &[usize], leaves: &mut impl Iterator<Item = Json>) -> Json {
    match shape.split_first() {
        None => leaves.next().unwrap_or(Json::Null),
        Some((len, rest)) => Json::Array((0..*len).map(|_| nest(rest, leaves)).collect()),
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err("truncated numeric array".to_string()),
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], String> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip<T: Serialize + DeserializeOwned>(value: &T) -> T {
        let bytes = encode(value).unwrap();
        decode(&bytes, Path::new("test.cache.array")).unwrap()
    }

    #[test]
    fn float_vector_roundtrip() {
        let v = vec![0.5, -1.25, 3.0];
        assert_eq!(roundtrip(&v), v);
    }

    #[test]
    fn int_matrix_roundtrip() {
        let m = vec![vec![1i64, 2, 3], vec![4, 5, 6]];
        assert_eq!(roundtrip(&m), m);
        let array = NumericArray::from_json(&json!(m)).unwrap();
        assert_eq!(array.shape, vec![2, 3]);
        assert!(matches!(array.data, ArrayData::Int(_)));
    }

    #[test]
    fn mixed_numbers_promote_to_float() {
        let array = NumericArray::from_json(&json!([1, 2.5])).unwrap();
        assert_eq!(array.data, ArrayData::Float(vec![1.0, 2.5]));
    }

    #[test]
    fn scalar_and_empty_arrays() {
        assert_eq!(roundtrip(&7i64), 7);
        let empty: Vec<f64> = vec![];
        assert_eq!(roundtrip(&empty), empty);
        let rows: Vec<Vec<i64>> = vec![vec![], vec![]];
        assert_eq!(roundtrip(&rows), rows);
    }

    #[test]
    fn fixed_size_arrays_roundtrip() {
        let cube = [[[1u8, 2], [3, 4]], [[5, 6], [7, 8]]];
        assert_eq!(roundtrip(&cube), cube);
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = NumericArray::from_json(&json!([[1, 2], [3]])).unwrap_err();
        assert!(matches!(err, CacheError::InvalidArray { .. }));
        let err = NumericArray::from_json(&json!([[1, 2], 3])).unwrap_err();
        assert!(matches!(err, CacheError::InvalidArray { .. }));
    }

    #[test]
    fn non_numeric_rejected() {
        for bad in [json!(["a"]), json!({"x": 1}), json!([true]), json!(null)] {
            let err = NumericArray::from_json(&bad).unwrap_err();
            assert!(matches!(err, CacheError::InvalidArray { .. }), "{bad}");
        }
    }

    #[test]
    fn structs_are_rejected() {
        #[derive(Serialize)]
        struct Point {
            x: f64,
        }
        let err = encode(&Point { x: 1.0 }).unwrap_err();
        assert!(matches!(err, CacheError::InvalidArray { .. }));
    }

    #[test]
    fn binary_layout() {
        let bytes = encode(&vec![vec![1i64], vec![2]]).unwrap();
        assert_eq!(bytes[0], b'i');
        assert_eq!(u32::from_le_bytes(bytes[1..5].try_into().unwrap()), 2);
        assert_eq!(bytes.len(), 1 + 4 + 2 * 8 + 2 * 8);
    }

    #[test]
    fn truncated_bytes_fail_to_decode() {
        let bytes = encode(&vec![1.0, 2.0]).unwrap();
        let err = decode::<Vec<f64>>(&bytes[..bytes.len() - 3], Path::new("t")).unwrap_err();
        assert!(matches!(err, CacheError::Deserialization { .. }));
        assert!(NumericArray::from_bytes(b"").is_err());
    }

    #[test]
    fn unknown_dtype_fails_to_decode() {
        let mut bytes = encode(&vec![1i64]).unwrap();
        bytes[0] = b'z';
        assert!(NumericArray::from_bytes(&bytes).unwrap_err().contains("dtype"));
    }
}
