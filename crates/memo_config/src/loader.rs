//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::MemoConfig;
use std::path::Path;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE: &str = "memo.toml";

/// Loads and validates `memo.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<MemoConfig, ConfigError> {
    load_config_file(&project_dir.join(CONFIG_FILE))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<MemoConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<MemoConfig, ConfigError> {
    let config: MemoConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse {
        reason: e.to_string(),
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and values are consistent.
fn validate_config(config: &MemoConfig) -> Result<(), ConfigError> {
    if config.cache.format.trim().is_empty() {
        return Err(ConfigError::MissingField { key: "cache.format" });
    }
    if matches!(config.cache.dir.as_deref(), Some(d) if d.trim().is_empty()) {
        return Err(ConfigError::MissingField { key: "cache.dir" });
    }
    if let Some(retry) = &config.cache.retry {
        if retry.attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache.retry.attempts",
                reason: "must be at least 1, got 0".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RetryConfig, WriteModeSetting};

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert!(config.cache.dir.is_none());
        assert_eq!(config.cache.format, "json");
        assert!(config.cache.compression);
        assert!(!config.cache.quiet);
        assert!(!config.cache.include_args);
        assert!(!config.cache.shard);
        assert_eq!(config.cache.write_mode, WriteModeSetting::Direct);
        assert!(config.cache.retry.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[cache]
dir = ".memo-cache"
format = "bincode"
compression = false
quiet = true
include_args = true
shard = true
write_mode = "atomic"

[cache.retry]
attempts = 3
delay_ms = 50
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.cache.dir.as_deref(), Some(".memo-cache"));
        assert_eq!(config.cache.format, "bincode");
        assert!(!config.cache.compression);
        assert!(config.cache.quiet);
        assert!(config.cache.include_args);
        assert!(config.cache.shard);
        assert_eq!(config.cache.write_mode, WriteModeSetting::Atomic);
        assert_eq!(
            config.cache.retry,
            Some(RetryConfig {
                attempts: 3,
                delay_ms: 50
            })
        );
    }

    #[test]
    fn retry_delay_has_default() {
        let toml = r#"
[cache.retry]
attempts = 2
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.cache.retry.unwrap().delay_ms, 1000);
    }

    #[test]
    fn zero_retry_attempts_errors() {
        let toml = r#"
[cache.retry]
attempts = 0
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert_eq!(err.key(), Some("cache.retry.attempts"));
        assert!(err.to_string().contains("cache.retry.attempts"));
    }

    #[test]
    fn empty_format_errors() {
        let err = load_config_from_str("[cache]\nformat = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { key: "cache.format" }));
    }

    #[test]
    fn empty_dir_errors() {
        let err = load_config_from_str("[cache]\ndir = \" \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { key: "cache.dir" }));
    }

    #[test]
    fn unknown_write_mode_errors() {
        let err = load_config_from_str("[cache]\nwrite_mode = \"eventually\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_from_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[cache]\ndir = \"cache\"\nformat = \"array\"\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.cache.dir.as_deref(), Some("cache"));
        assert_eq!(config.cache.format, "array");
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        match err {
            ConfigError::Io { path, source } => {
                assert_eq!(path, Path::new("/nonexistent/dir").join(CONFIG_FILE));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
