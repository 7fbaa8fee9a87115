//! Reading and writing cache files.
//!
//! Values are encoded in memory first and then written in one pass, through
//! a gzip stream when compression is enabled. A failed write removes whatever
//! was partially written before the original error is returned, so a cache
//! path is never left holding a readable-but-corrupt file.

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::time::Duration;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::array;
use crate::error::CacheError;
use crate::format::{CacheFormat, Compression, FormatSpec};

/// How cache files are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Write straight to the cache path. Concurrent writers of the same key
    /// race; the last one wins.
    #[default]
    Direct,
    /// Write to a temporary file in the same directory and rename it into
    /// place, so readers only ever see complete files.
    Atomic,
}

/// What to do when a cache file exists but cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadPolicy {
    /// Return the decode error.
    #[default]
    Fail,
    /// Sleep and re-read, for directories shared with a writer that may not
    /// have finished. Only decode errors are retried; I/O errors are not.
    Retry {
        /// Extra attempts after the first failure.
        attempts: u32,
        /// Pause between attempts.
        delay: Duration,
    },
}

/// Encodes a value in the given format.
pub fn encode<T: Serialize + ?Sized>(value: &T, format: CacheFormat) -> Result<Vec<u8>, CacheError> {
    let serialization = |reason: String| CacheError::Serialization { reason };
    match format {
        CacheFormat::Json => serde_json::to_vec(value).map_err(|e| serialization(e.to_string())),
        CacheFormat::Bincode => bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| serialization(e.to_string())),
        CacheFormat::Array => array::encode(value),
    }
}

/// Decodes bytes read from `path` in the given format.
pub fn decode<T: DeserializeOwned>(
    bytes: &[u8],
    format: CacheFormat,
    path: &Path,
) -> Result<T, CacheError> {
    let deserialization = |reason: String| CacheError::Deserialization {
        path: path.to_path_buf(),
        reason,
    };
    match format {
        CacheFormat::Json => serde_json::from_slice(bytes).map_err(|e| deserialization(e.to_string())),
        CacheFormat::Bincode => {
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map(|(value, _)| value)
                .map_err(|e| deserialization(e.to_string()))
        }
        CacheFormat::Array => array::decode(bytes, path),
    }
}

/// Writes `value` to `path`.
///
/// The parent directory must already exist. Json payloads are decoded back
/// into `T` before anything is written, since the encoder maps non-finite
/// floats to `null`.
pub fn write<T: Serialize + DeserializeOwned>(
    value: &T,
    spec: FormatSpec,
    path: &Path,
    mode: WriteMode,
) -> Result<(), CacheError> {
    let payload = encode(value, spec.format)?;
    if spec.format == CacheFormat::Json {
        serde_json::from_slice::<T>(&payload).map_err(|e| CacheError::Serialization {
            reason: format!("value does not survive json encoding: {e}"),
        })?;
    }
    match mode {
        WriteMode::Direct => write_direct(path, &payload, spec.compression),
        WriteMode::Atomic => write_atomic(path, &payload, spec.compression),
    }
}

/// Reads and decodes the value stored at `path`.
pub fn read<T: DeserializeOwned>(
    spec: FormatSpec,
    path: &Path,
    policy: ReadPolicy,
) -> Result<T, CacheError> {
    let (attempts, delay) = match policy {
        ReadPolicy::Fail => return read_once(spec, path),
        ReadPolicy::Retry { attempts, delay } => (attempts, delay),
    };
    let mut attempt = 0;
    loop {
        match read_once(spec, path) {
            Err(CacheError::Deserialization { reason, .. }) if attempt < attempts => {
                attempt += 1;
                tracing::warn!(
                    "cannot decode {} ({reason}); retrying ({attempt}/{attempts})",
                    path.display()
                );
                std::thread::sleep(delay);
            }
            other => return other,
        }
    }
}

fn read_once<T: DeserializeOwned>(spec: FormatSpec, path: &Path) -> Result<T, CacheError> {
    let bytes = read_bytes(path, spec.compression)?;
    decode(&bytes, spec.format, path)
}

/// Reads the raw payload. A truncated or malformed gzip stream is a decode
/// error, not an I/O error.
fn read_bytes(path: &Path, compression: Compression) -> Result<Vec<u8>, CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    match compression {
        Compression::None => std::fs::read(path).map_err(io_err),
        Compression::Gzip => {
            let mut decoder = GzDecoder::new(File::open(path).map_err(io_err)?);
            let mut bytes = Vec::new();
            decoder
                .read_to_end(&mut bytes)
                .map_err(|e| match e.kind() {
                    ErrorKind::UnexpectedEof | ErrorKind::InvalidData => {
                        CacheError::Deserialization {
                            path: path.to_path_buf(),
                            reason: format!("bad gzip stream: {e}"),
                        }
                    }
                    _ => io_err(e),
                })?;
            Ok(bytes)
        }
    }
}

fn write_direct(path: &Path, payload: &[u8], compression: Compression) -> Result<(), CacheError> {
    write_with_cleanup(path, payload, compression, |file| file)
}

/// Creates `path`, writes through `wrap(file)`, and removes the file if any
/// step after creation fails.
fn write_with_cleanup<W: Write>(
    path: &Path,
    payload: &[u8],
    compression: Compression,
    wrap: impl FnOnce(File) -> W,
) -> Result<(), CacheError> {
    let file = File::create(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if let Err(source) = write_payload(wrap(file), payload, compression) {
        remove_partial(path);
        return Err(CacheError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

fn write_atomic(path: &Path, payload: &[u8], compression: Compression) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    // The temp file deletes itself if anything below fails.
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    write_payload(tmp.as_file_mut(), payload, compression).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

fn write_payload<W: Write>(writer: W, payload: &[u8], compression: Compression) -> std::io::Result<()> {
    match compression {
        Compression::None => {
            let mut writer = BufWriter::new(writer);
            writer.write_all(payload)?;
            writer.flush()
        }
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(writer, flate2::Compression::default());
            encoder.write_all(payload)?;
            encoder.finish()?.flush()
        }
    }
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("removed partial cache file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            "failed to remove partial cache file {}: {e}",
            path.display()
        ),
    }
}
