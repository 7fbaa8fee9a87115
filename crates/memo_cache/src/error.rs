//! Error types for cache operations.

use std::path::PathBuf;

use memo_common::HashingError;

/// Errors that can occur while resolving, reading or writing a cache entry.
///
/// None of these are swallowed: a failing read or write surfaces to the
/// caller of the memoized function. Errors raised by the wrapped function
/// itself are not represented here; see [`MemoError`](crate::MemoError).
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A format or extension token is not one of the supported formats.
    #[error("\"{token}\" is not a supported cache format")]
    UnsupportedFormat {
        /// The rejected token, as given.
        token: String,
    },

    /// A cache name or comment contains a path separator.
    #[error("cache {what} \"{value}\" cannot be used in a file name")]
    InvalidKeyPart {
        /// Which part of the key: `name` or `comment`.
        what: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Call arguments could not be hashed into a signature.
    #[error(transparent)]
    Hashing(#[from] HashingError),

    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A value could not be serialized into the selected format.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A cache file could not be decoded.
    #[error("failed to decode cache file {path}: {reason}")]
    Deserialization {
        /// The cache file path.
        path: PathBuf,
        /// Description of the decode failure.
        reason: String,
    },

    /// A value stored in the numeric array format is not a rectangular
    /// array of numbers.
    #[error("invalid numeric array: {reason}")]
    InvalidArray {
        /// Description of the problem.
        reason: String,
    },
}
