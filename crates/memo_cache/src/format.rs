//! Serialization formats and compression selection.
//!
//! A cache file carries no magic bytes: its format and compression are known
//! only from the file name suffix produced by [`FormatSpec::suffix`].

use std::fmt;
use std::str::FromStr;

use crate::error::CacheError;

/// The closed set of serialization formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheFormat {
    /// Human-readable JSON. Round-trips JSON-compatible data only.
    Json,
    /// Compact binary encoding via bincode. Round-trips any serde type.
    Bincode,
    /// A single rectangular array of numbers.
    Array,
}

impl CacheFormat {
    /// All supported formats.
    pub const ALL: [CacheFormat; 3] = [CacheFormat::Json, CacheFormat::Bincode, CacheFormat::Array];

    /// The token used for this format in options and file names.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheFormat::Json => "json",
            CacheFormat::Bincode => "bincode",
            CacheFormat::Array => "array",
        }
    }
}

impl fmt::Display for CacheFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheFormat {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| CacheError::UnsupportedFormat {
                token: s.to_string(),
            })
    }
}

impl From<CacheFormat> for String {
    fn from(format: CacheFormat) -> Self {
        format.as_str().to_string()
    }
}

/// Stream compression applied on top of any format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Bytes are stored as produced by the format.
    None,
    /// Bytes are wrapped in a gzip stream.
    Gzip,
}

impl Compression {
    /// File name suffix for this compression, if any.
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some("gz"),
        }
    }
}

impl From<bool> for Compression {
    fn from(enabled: bool) -> Self {
        if enabled {
            Compression::Gzip
        } else {
            Compression::None
        }
    }
}

/// A format paired with a compression choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatSpec {
    /// Serialization format.
    pub format: CacheFormat,
    /// Stream compression.
    pub compression: Compression,
}

impl FormatSpec {
    /// Creates a spec from its parts.
    pub fn new(format: CacheFormat, compression: Compression) -> Self {
        Self {
            format,
            compression,
        }
    }

    /// Parses an extension string such as `"json.gz"` or `"cache.bincode"`.
    ///
    /// Compression is inferred from a `gz` or `gzip` token; the format from
    /// exactly one format token. Any other token is rejected rather than
    /// ignored, so a typo never silently selects a default format.
    pub fn parse_ext(ext: &str) -> Result<Self, CacheError> {
        let unsupported = || CacheError::UnsupportedFormat {
            token: ext.to_string(),
        };
        let mut format = None;
        let mut compression = Compression::None;
        for token in ext.split(|c: char| !c.is_ascii_alphanumeric()) {
            match token {
                "" | "cache" => {}
                "gz" | "gzip" => compression = Compression::Gzip,
                other => {
                    let parsed = other.parse::<CacheFormat>().map_err(|_| unsupported())?;
                    if format.replace(parsed).is_some() {
                        return Err(unsupported());
                    }
                }
            }
        }
        format
            .map(|format| Self::new(format, compression))
            .ok_or_else(unsupported)
    }

    /// The file name suffix following `.cache.`, e.g. `json` or `json.gz`.
    pub fn suffix(&self) -> String {
        match self.compression.suffix() {
            Some(c) => format!("{}.{c}", self.format),
            None => self.format.to_string(),
        }
    }

    /// Strict inverse of [`FormatSpec::suffix`].
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let (format, compression) = match suffix.split_once('.') {
            Some((format, "gz")) => (format, Compression::Gzip),
            Some(_) => return None,
            None => (suffix, Compression::None),
        };
        let format = format.parse().ok()?;
        Some(Self::new(format, compression))
    }
}
