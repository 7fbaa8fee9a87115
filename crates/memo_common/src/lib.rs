//! Shared foundational types used across the memo caching crates.
//!
//! This crate provides the hashable [`Value`] model, order-independent content
//! hashing of nested data, and the compact base-64 integer encoding used to
//! keep cache file names short.

#![warn(missing_docs)]

pub mod compact;
pub mod error;
pub mod hash;
pub mod value;

pub use compact::{decode, decode_unsigned, encode, encode_unsigned};
pub use error::{DecodeError, HashingError};
pub use hash::{content_hash, content_hash_lossy, ContentHash};
pub use value::Value;
