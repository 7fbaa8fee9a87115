//! Errors raised while loading `memo.toml`.

use std::path::PathBuf;

/// Errors that can occur when loading or validating a configuration.
///
/// Validation errors carry the dotted key they refer to, e.g.
/// `cache.retry.attempts`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The content is not valid TOML for a configuration.
    #[error("failed to parse configuration: {reason}")]
    Parse {
        /// Parser message, including the location.
        reason: String,
    },

    /// A key that must not be blank is empty.
    #[error("{key} must not be empty")]
    MissingField {
        /// Dotted key.
        key: &'static str,
    },

    /// A key holds a value outside its allowed range.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Dotted key.
        key: &'static str,
        /// What is wrong with the value.
        reason: String,
    },
}

impl ConfigError {
    /// The dotted key a validation error refers to.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { key } | Self::InvalidValue { key, .. } => Some(*key),
            Self::Io { .. } | Self::Parse { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_the_key() {
        let err = ConfigError::MissingField { key: "cache.dir" };
        assert_eq!(err.to_string(), "cache.dir must not be empty");
        assert_eq!(err.key(), Some("cache.dir"));
    }

    #[test]
    fn invalid_value_names_the_key() {
        let err = ConfigError::InvalidValue {
            key: "cache.retry.attempts",
            reason: "must be at least 1, got 0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for cache.retry.attempts: must be at least 1, got 0"
        );
    }

    #[test]
    fn io_error_names_the_file() {
        let err = ConfigError::Io {
            path: PathBuf::from("/srv/app/memo.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().starts_with("cannot read /srv/app/memo.toml"));
        assert_eq!(err.key(), None);
    }
}
