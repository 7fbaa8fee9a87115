//! Configuration types deserialized from `memo.toml`.

use serde::Deserialize;

/// The top-level configuration parsed from `memo.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoConfig {
    /// Process-wide cache defaults.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Defaults applied to every memoized function unless overridden at wrap
/// time or call time.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Cache directory. Without one, caching is disabled.
    #[serde(default)]
    pub dir: Option<String>,
    /// Serialization format token (`json`, `bincode`, `array`).
    #[serde(default = "default_format")]
    pub format: String,
    /// Whether cache files are gzip-compressed.
    #[serde(default = "default_true")]
    pub compression: bool,
    /// Suppress informational diagnostics.
    #[serde(default)]
    pub quiet: bool,
    /// Hash call arguments into the file name.
    #[serde(default)]
    pub include_args: bool,
    /// Spread argument-keyed entries over 256 subdirectories.
    #[serde(default)]
    pub shard: bool,
    /// How cache files are written.
    #[serde(default)]
    pub write_mode: WriteModeSetting,
    /// Retry reads that fail to decode, for directories shared with slow writers.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: default_format(),
            compression: true,
            quiet: false,
            include_args: false,
            shard: false,
            write_mode: WriteModeSetting::default(),
            retry: None,
        }
    }
}

/// Write strategy selected in the configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteModeSetting {
    /// Write straight to the cache path.
    #[default]
    Direct,
    /// Write to a temporary file and rename it into place.
    Atomic,
}

/// Read retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Number of extra attempts after the first failed decode.
    pub attempts: u32,
    /// Delay between attempts, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_format() -> String {
    "json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_delay_ms() -> u64 {
    1000
}
