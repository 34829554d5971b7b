//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers; loading and validation live in `loader.rs`/`validate.rs`.
//! - Secrets never appear in `Debug` output.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Fully validated configuration snapshot for the transfer service.
#[derive(Debug, Clone)]
pub struct CourierConfig {
    /// Local root that inbound relative source paths are joined onto.
    pub data_root: PathBuf,
    /// Settings for the Prime share destination.
    pub prime: PrimeConfig,
    /// Settings for the RRD vendor SFTP destination.
    pub rrd: RrdConfig,
    /// Operational notification settings.
    pub notifications: NotificationConfig,
    /// Logging preferences.
    pub logging: LoggingSettings,
}

/// Prime share destination settings.
#[derive(Debug, Clone)]
pub struct PrimeConfig {
    /// Mounted share root receiving manifest files.
    pub manifest_root: PathBuf,
    /// Mounted share root receiving payload files.
    pub payload_root: PathBuf,
    /// Fixed directory appended below each routing key.
    pub payload_subdir: String,
    /// Filename suffix identifying manifest files.
    pub manifest_suffix: String,
    /// Character offset of the routing key within payload filenames.
    pub routing_key_offset: usize,
    /// Character width of the routing key.
    pub routing_key_width: usize,
    /// Deadline applied to each share upload.
    pub io_timeout: Duration,
}

/// RRD secure-copy destination settings.
#[derive(Debug, Clone)]
pub struct RrdConfig {
    /// Remote host name or address.
    pub host: String,
    /// Remote SSH port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: Secret,
    /// Remote directory archives are written into.
    pub remote_dir: String,
    /// Host key trust decision.
    pub host_key_policy: HostKeyPolicy,
    /// Deadline for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Deadline for the whole upload, session setup included.
    pub upload_timeout: Duration,
    /// When the packaged source directory is removed.
    pub cleanup_order: CleanupOrder,
}

/// Notification settings.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Service name stamped on every notification.
    pub service_name: String,
    /// Subject line used for every notification.
    pub subject: String,
    /// Optional webhook receiving JSON notifications.
    pub webhook_url: Option<String>,
}

/// Logging preferences carried through to telemetry initialisation.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
    /// Explicit format (`json` or `pretty`) when configured.
    pub format: Option<String>,
}

/// String wrapper that redacts its contents when formatted.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a sensitive value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Trust decision applied to the remote host key during SFTP handshakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept any host key.
    Disabled,
    /// Require the key to match an entry in an OpenSSH `known_hosts` file.
    KnownHosts(PathBuf),
}

impl HostKeyPolicy {
    /// Render the policy in its configuration syntax.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Disabled => "disabled".to_string(),
            Self::KnownHosts(path) => format!("known_hosts:{}", path.display()),
        }
    }
}

impl FromStr for HostKeyPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(path) = trimmed.strip_prefix("known_hosts:") {
            if path.trim().is_empty() {
                return Err(ConfigError::invalid(
                    crate::defaults::HOST_KEY_POLICY,
                    "empty",
                    Some(s),
                ));
            }
            return Ok(Self::KnownHosts(PathBuf::from(path.trim())));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "disabled" | "no" | "off" => Ok(Self::Disabled),
            _ => Err(ConfigError::invalid(
                crate::defaults::HOST_KEY_POLICY,
                "unsupported",
                Some(s),
            )),
        }
    }
}

/// Ordering of source-directory removal relative to the RRD upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupOrder {
    /// Remove the source directory only after the upload is confirmed.
    #[default]
    AfterUpload,
    /// Remove the source directory as soon as the archive exists.
    BeforeUpload,
}

impl CleanupOrder {
    /// Render the ordering as its configuration value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AfterUpload => "after_upload",
            Self::BeforeUpload => "before_upload",
        }
    }
}

impl FromStr for CleanupOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "after_upload" => Ok(Self::AfterUpload),
            "before_upload" => Ok(Self::BeforeUpload),
            _ => Err(ConfigError::invalid(
                crate::defaults::RRD_CLEANUP_ORDER,
                "unsupported",
                Some(s),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn host_key_policy_parses_variants() -> Result<(), ConfigError> {
        assert_eq!("disabled".parse::<HostKeyPolicy>()?, HostKeyPolicy::Disabled);
        assert_eq!("NO".parse::<HostKeyPolicy>()?, HostKeyPolicy::Disabled);
        assert_eq!(
            "known_hosts:/etc/ssh/known_hosts".parse::<HostKeyPolicy>()?,
            HostKeyPolicy::KnownHosts(PathBuf::from("/etc/ssh/known_hosts"))
        );
        assert!("known_hosts:".parse::<HostKeyPolicy>().is_err());
        assert!("strict".parse::<HostKeyPolicy>().is_err());
        Ok(())
    }

    #[test]
    fn cleanup_order_round_trips_configuration_values() -> Result<(), ConfigError> {
        for order in [CleanupOrder::AfterUpload, CleanupOrder::BeforeUpload] {
            assert_eq!(order.as_str().parse::<CleanupOrder>()?, order);
        }
        assert_eq!(CleanupOrder::default(), CleanupOrder::AfterUpload);
        assert!("sometime".parse::<CleanupOrder>().is_err());
        Ok(())
    }
}
