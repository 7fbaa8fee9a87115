//! Disk-backed memoization of function results.
//!
//! This crate wraps a function so that its result is persisted to a file
//! named after the function, an optional comment and (optionally) a content
//! hash of the call arguments. Later calls with the same identity read the
//! file back instead of recomputing. Serialization formats and gzip
//! compression are pluggable; configuration is layered per call, per wrapper
//! and per process.

#![warn(missing_docs)]

pub mod args;
pub mod array;
pub mod backend;
pub mod error;
pub mod format;
pub mod key;
pub mod memoize;
pub mod options;

pub use args::{BoundArgs, CallArgs, ParamTable};
pub use backend::{ReadPolicy, WriteMode};
pub use error::CacheError;
pub use format::{CacheFormat, Compression, FormatSpec};
pub use key::{parse_file_name, ArgSignature, CacheFileInfo, CacheKey};
pub use memoize::{MemoError, Memoized};
pub use options::{CacheDirProvider, CacheOptions, GlobalDefaults, Transform};
