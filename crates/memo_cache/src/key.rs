//! Cache key and path resolution.
//!
//! File name grammar:
//!
//! ```text
//! <name>[_<sign><signature>][_<comment>].cache.<format>[.gz]
//! ```
//!
//! `<sign>` is `p` for a non-negative signature and `n` for a negative one,
//! followed by the compact encoding of its magnitude. With sharding enabled,
//! signed entries live one directory deeper, in one of 256 buckets.

use std::fmt;
use std::path::{Path, PathBuf};

use memo_common::{
    content_hash, content_hash_lossy, decode_unsigned, encode_unsigned, ContentHash,
};

use crate::args::BoundArgs;
use crate::error::CacheError;
use crate::format::FormatSpec;

/// Infix separating the entry stem from the format suffix.
const CACHE_INFIX: &str = ".cache.";

/// Number of shard directories.
const SHARD_COUNT: u128 = 256;

/// Hash of a call's bound arguments, as a signed 128-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgSignature(i128);

impl ArgSignature {
    /// Hashes bound arguments.
    ///
    /// With `lossy`, unhashable arguments hash to a shared sentinel instead
    /// of failing.
    pub fn of(args: &BoundArgs, lossy: bool) -> Result<Self, CacheError> {
        let value = args.to_value();
        let hash = if lossy {
            content_hash_lossy(&value)
        } else {
            content_hash(&value)?
        };
        Ok(Self::from_hash(hash))
    }

    /// Reinterprets a content hash as a signature.
    pub fn from_hash(hash: ContentHash) -> Self {
        Self(hash.as_u128() as i128)
    }

    /// The signed value.
    pub fn value(&self) -> i128 {
        self.0
    }

    /// Parses the `p`/`n` token written by `Display`.
    pub fn parse(token: &str) -> Option<Self> {
        if let Some(digits) = token.strip_prefix('p') {
            let magnitude = decode_unsigned(digits).ok()?;
            return i128::try_from(magnitude).ok().map(Self);
        }
        let magnitude = decode_unsigned(token.strip_prefix('n')?).ok()?;
        if magnitude == 0 {
            return None;
        }
        if magnitude == i128::MIN.unsigned_abs() {
            return Some(Self(i128::MIN));
        }
        i128::try_from(magnitude).ok().map(|m| Self(-m))
    }

    /// Name of the shard directory holding entries with this signature.
    pub fn shard(&self) -> String {
        encode_unsigned(self.0 as u128 % SHARD_COUNT)
    }
}

impl fmt::Display for ArgSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { 'n' } else { 'p' };
        write!(f, "{sign}{}", encode_unsigned(self.0.unsigned_abs()))
    }
}

/// Everything that identifies one cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Function identity.
    pub name: String,
    /// Optional disambiguator.
    pub comment: Option<String>,
    /// Argument signature, when argument-sensitive caching is on.
    pub signature: Option<ArgSignature>,
    /// Format and compression.
    pub spec: FormatSpec,
    /// Whether signed entries go into a shard subdirectory.
    pub shard: bool,
}

impl CacheKey {
    /// Rejects names and comments that would leave the cache directory.
    pub fn validate(&self) -> Result<(), CacheError> {
        check_part("name", &self.name)?;
        match self.comment.as_deref() {
            Some(comment) => check_part("comment", comment),
            None => Ok(()),
        }
    }

    /// The file name of this entry.
    pub fn file_name(&self) -> String {
        let mut name = self.name.clone();
        if let Some(signature) = &self.signature {
            name.push('_');
            name.push_str(&signature.to_string());
        }
        if let Some(comment) = self.comment.as_deref().filter(|c| !c.is_empty()) {
            name.push('_');
            name.push_str(comment);
        }
        name.push_str(CACHE_INFIX);
        name.push_str(&self.spec.suffix());
        name
    }

    /// The directory holding this entry under `cache_dir`.
    pub fn dir_in(&self, cache_dir: &Path) -> PathBuf {
        match (&self.signature, self.shard) {
            (Some(signature), true) => cache_dir.join(signature.shard()),
            _ => cache_dir.to_path_buf(),
        }
    }

    /// The full path of this entry under `cache_dir`.
    pub fn path_in(&self, cache_dir: &Path) -> PathBuf {
        self.dir_in(cache_dir).join(self.file_name())
    }
}

/// What can be recovered from a cache file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheFileInfo {
    /// Everything before `.cache.`: name, signature and comment.
    pub stem: String,
    /// Format and compression from the suffix.
    pub spec: FormatSpec,
}

impl CacheFileInfo {
    /// Returns `true` if this entry was written for the function `name`.
    ///
    /// An unsigned entry with a comment cannot be told apart from another
    /// function whose name extends `name`, so `search_v2` matches only
    /// `matches("search", Some("v2"))`. Signed entries carry a parseable
    /// signature after the name and match with any comment.
    pub fn belongs_to(&self, name: &str) -> bool {
        self.matches(name, None)
    }

    /// Returns `true` if this entry was written for `name`, restricted to
    /// `comment` when one is given.
    pub fn matches(&self, name: &str, comment: Option<&str>) -> bool {
        let Some(rest) = self.stem.strip_prefix(name) else {
            return false;
        };
        let after_signature = strip_signature(rest);
        match comment {
            None => {
                rest.is_empty()
                    || after_signature.is_some_and(|tail| tail.is_empty() || tail.starts_with('_'))
            }
            Some(comment) => {
                let is_comment = |tail: &str| tail.strip_prefix('_') == Some(comment);
                is_comment(rest) || after_signature.is_some_and(is_comment)
            }
        }
    }
}

/// Strips a leading `_<sign><signature>` segment, returning what follows.
fn strip_signature(rest: &str) -> Option<&str> {
    let segment = rest.strip_prefix('_')?;
    let (token, tail) = segment.split_at(segment.find('_').unwrap_or(segment.len()));
    ArgSignature::parse(token).map(|_| tail)
}

fn check_part(what: &'static str, value: &str) -> Result<(), CacheError> {
    if value.contains(['/', '\\', '\0']) || value == ".." {
        return Err(CacheError::InvalidKeyPart {
            what,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Parses a cache file name, returning `None` for anything else.
pub fn parse_file_name(file_name: &str) -> Option<CacheFileInfo> {
    let (stem, suffix) = file_name.rsplit_once(CACHE_INFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(CacheFileInfo {
        stem: stem.to_string(),
        spec: FormatSpec::from_suffix(suffix)?,
    })
}
