//! Configuration sources and the startup loader.
//!
//! # Design
//! - Sources are flat key/value maps so environment and file inputs share one validation path.
//! - Later layers override earlier ones; the process environment is applied last.
//! - Every required key is checked before the service accepts its first event.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::debug;

use crate::defaults::{
    CONFIG_FILE_ENV, DATA_DIRECTORY, DEFAULT_LOG_LEVEL, DEFAULT_MANIFEST_SUFFIX,
    DEFAULT_PAYLOAD_SUBDIR, DEFAULT_ROUTING_KEY_OFFSET, DEFAULT_ROUTING_KEY_WIDTH,
    DEFAULT_SERVICE_NAME, DEFAULT_SFTP_CONNECT_TIMEOUT_SECS, DEFAULT_SFTP_UPLOAD_TIMEOUT_SECS,
    DEFAULT_SHARE_TIMEOUT_SECS, HOST_KEY_POLICY, LOG_FORMAT, LOG_LEVEL, MANIFEST_SHARE,
    MANIFEST_SUFFIX, NOTIFY_WEBHOOK, PAYLOAD_SHARE, PAYLOAD_SUBDIR, ROUTING_KEY_OFFSET,
    ROUTING_KEY_WIDTH, RRD_CLEANUP_ORDER, SERVICE_NAME, SFTP_CONNECT_TIMEOUT_SECS, SFTP_HOST,
    SFTP_PASS, SFTP_PORT, SFTP_REMOTE_DIR, SFTP_UPLOAD_TIMEOUT_SECS, SFTP_USER,
    SHARE_TIMEOUT_SECS,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    CleanupOrder, CourierConfig, HostKeyPolicy, LoggingSettings, NotificationConfig, PrimeConfig,
    RrdConfig, Secret,
};
use crate::validate::{
    optional, optional_or, parse_port, parse_secs, parse_usize, parse_with, required,
    required_path,
};

/// Flat key/value configuration source.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    values: BTreeMap<String, String>,
}

impl ConfigSource {
    /// Snapshot the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars().collect(),
        }
    }

    /// Build a source from explicit pairs (primarily for tests and embedding).
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Parse a flat YAML mapping of keys to scalar values.
    ///
    /// # Errors
    ///
    /// Returns an error when the document is not a mapping or a value is not a scalar.
    pub fn from_yaml_str(text: &str, origin: &Path) -> ConfigResult<Self> {
        let parsed: BTreeMap<String, Value> =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
                path: origin.to_path_buf(),
                source,
            })?;
        let mut values = BTreeMap::new();
        for (key, value) in parsed {
            let rendered = match value {
                Value::Null => continue,
                Value::Bool(flag) => flag.to_string(),
                Value::Number(number) => number.to_string(),
                Value::String(text) => text,
                Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => {
                    return Err(ConfigError::NonScalar { key });
                }
            };
            values.insert(key, rendered);
        }
        Ok(Self { values })
    }

    /// Read and parse a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_yaml_file(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            operation: "config_file.read",
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }

    /// Overlay `other` on top of this source; keys in `other` win.
    #[must_use]
    pub fn layered(mut self, other: Self) -> Self {
        self.values.extend(other.values);
        self
    }

    /// Look up a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Load configuration from an optional YAML file overlaid by the process environment.
///
/// The file is taken from `config_file` when provided, otherwise from the
/// `COURIER_CONFIG` environment variable.
///
/// # Errors
///
/// Returns an error when the file cannot be read or any required key is missing or invalid.
pub fn load_from_env(config_file: Option<&Path>) -> ConfigResult<CourierConfig> {
    let env = ConfigSource::from_env();
    let file = config_file
        .map(Path::to_path_buf)
        .or_else(|| env.get(CONFIG_FILE_ENV).map(PathBuf::from));

    let source = match file {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration file");
            ConfigSource::from_yaml_file(&path)?.layered(env)
        }
        None => env,
    };
    load(&source)
}

/// Validate a configuration source into a typed snapshot.
///
/// # Errors
///
/// Returns an error naming the first missing or invalid key.
pub fn load(source: &ConfigSource) -> ConfigResult<CourierConfig> {
    let data_root = required_path(source, DATA_DIRECTORY)?;

    let routing_key_width = parse_usize(source, ROUTING_KEY_WIDTH, DEFAULT_ROUTING_KEY_WIDTH)?;
    if routing_key_width == 0 {
        return Err(ConfigError::invalid(
            ROUTING_KEY_WIDTH,
            "out_of_range",
            Some("0"),
        ));
    }
    let manifest_suffix = optional_or(source, MANIFEST_SUFFIX, DEFAULT_MANIFEST_SUFFIX);
    let payload_subdir = optional_or(source, PAYLOAD_SUBDIR, DEFAULT_PAYLOAD_SUBDIR);
    if payload_subdir.contains(['/', '\\']) {
        return Err(ConfigError::invalid(
            PAYLOAD_SUBDIR,
            "unsupported",
            Some(&payload_subdir),
        ));
    }

    let prime = PrimeConfig {
        manifest_root: required_path(source, MANIFEST_SHARE)?,
        payload_root: required_path(source, PAYLOAD_SHARE)?,
        payload_subdir,
        manifest_suffix,
        routing_key_offset: parse_usize(source, ROUTING_KEY_OFFSET, DEFAULT_ROUTING_KEY_OFFSET)?,
        routing_key_width,
        io_timeout: parse_secs(source, SHARE_TIMEOUT_SECS, DEFAULT_SHARE_TIMEOUT_SECS)?,
    };

    let port_value = required(source, SFTP_PORT)?;
    let host_key_policy =
        parse_with::<HostKeyPolicy>(source, HOST_KEY_POLICY)?.unwrap_or(HostKeyPolicy::Disabled);

    let rrd = RrdConfig {
        host: required(source, SFTP_HOST)?,
        port: parse_port(SFTP_PORT, &port_value)?,
        user: required(source, SFTP_USER)?,
        password: Secret::new(required(source, SFTP_PASS)?),
        remote_dir: required(source, SFTP_REMOTE_DIR)?,
        host_key_policy,
        connect_timeout: parse_secs(
            source,
            SFTP_CONNECT_TIMEOUT_SECS,
            DEFAULT_SFTP_CONNECT_TIMEOUT_SECS,
        )?,
        upload_timeout: parse_secs(
            source,
            SFTP_UPLOAD_TIMEOUT_SECS,
            DEFAULT_SFTP_UPLOAD_TIMEOUT_SECS,
        )?,
        cleanup_order: parse_with::<CleanupOrder>(source, RRD_CLEANUP_ORDER)?.unwrap_or_default(),
    };

    let service_name = optional_or(source, SERVICE_NAME, DEFAULT_SERVICE_NAME);
    let notifications = NotificationConfig {
        subject: format!("{service_name} update"),
        service_name,
        webhook_url: optional(source, NOTIFY_WEBHOOK),
    };

    let logging = LoggingSettings {
        level: optional_or(source, LOG_LEVEL, DEFAULT_LOG_LEVEL),
        format: optional(source, LOG_FORMAT),
    };

    Ok(CourierConfig {
        data_root,
        prime,
        rrd,
        notifications,
        logging,
    })
}
