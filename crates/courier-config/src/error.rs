//! Error types for configuration loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required key was absent from every configured source.
    #[error("missing configuration field")]
    MissingField {
        /// Name of the missing key.
        key: &'static str,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Key that failed validation.
        key: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when it is safe to echo.
        value: Option<String>,
    },
    /// A YAML source contained a non-scalar value for a key.
    #[error("unsupported configuration value")]
    NonScalar {
        /// Key carrying the structured value.
        key: String,
    },
    /// Reading a configuration file failed.
    #[error("configuration file io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// File involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// A configuration file could not be parsed.
    #[error("configuration file parse failure")]
    Yaml {
        /// File (or origin label) that failed to parse.
        path: PathBuf,
        /// Source YAML error.
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: &'static str, value: Option<&str>) -> Self {
        Self::InvalidField {
            key,
            reason,
            value: value.map(str::to_string),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_helper_keeps_context_out_of_message() {
        let err = ConfigError::invalid("RRD_SFTP_PORT", "not_a_number", Some("abc"));
        assert_eq!(err.to_string(), "invalid configuration field");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                key: "RRD_SFTP_PORT",
                reason: "not_a_number",
                value: Some(ref value),
            } if value == "abc"
        ));
    }
}
