//! Test fixtures: temporary batch trees and a complete sample configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use courier_config::{
    CleanupOrder, CourierConfig, HostKeyPolicy, LoggingSettings, NotificationConfig, PrimeConfig,
    RrdConfig, Secret,
};
use tempfile::TempDir;

/// Create a temporary directory with a recognisable prefix.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn temp_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("courier-test-")
        .tempdir()
        .context("failed to create temporary directory")
}

/// Create `relative` beneath `root` and populate it with `files`.
///
/// # Errors
///
/// Returns an error if any directory or file cannot be written.
pub fn batch_dir(root: &Path, relative: &str, files: &[(&str, &[u8])]) -> Result<PathBuf> {
    let dir = root.join(relative);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for (name, contents) in files {
        let path = dir.join(name);
        fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(dir)
}

/// Layout of a sandboxed service: data root plus the two share roots.
#[derive(Debug)]
pub struct Sandbox {
    /// Owning temporary directory.
    pub dir: TempDir,
    /// Local data root inbound paths resolve against.
    pub data_root: PathBuf,
    /// Manifest share root.
    pub manifest_root: PathBuf,
    /// Payload share root.
    pub payload_root: PathBuf,
}

impl Sandbox {
    /// Create the sandbox directories.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub fn new() -> Result<Self> {
        let dir = temp_dir()?;
        let data_root = dir.path().join("data");
        let manifest_root = dir.path().join("share").join("manifest");
        let payload_root = dir.path().join("share").join("pdf");
        for path in [&data_root, &manifest_root, &payload_root] {
            fs::create_dir_all(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
        }
        Ok(Self {
            dir,
            data_root,
            manifest_root,
            payload_root,
        })
    }

    /// Configuration pointing at the sandbox, with the given RRD cleanup order.
    #[must_use]
    pub fn config(&self, cleanup_order: CleanupOrder) -> CourierConfig {
        sample_config(
            &self.data_root,
            &self.manifest_root,
            &self.payload_root,
            cleanup_order,
        )
    }
}

/// Complete configuration using default optional values.
#[must_use]
pub fn sample_config(
    data_root: &Path,
    manifest_root: &Path,
    payload_root: &Path,
    cleanup_order: CleanupOrder,
) -> CourierConfig {
    CourierConfig {
        data_root: data_root.to_path_buf(),
        prime: PrimeConfig {
            manifest_root: manifest_root.to_path_buf(),
            payload_root: payload_root.to_path_buf(),
            payload_subdir: "ProdPDFs".to_string(),
            manifest_suffix: ".txt".to_string(),
            routing_key_offset: 10,
            routing_key_width: 6,
            io_timeout: Duration::from_secs(5),
        },
        rrd: RrdConfig {
            host: "rrd.example.net".to_string(),
            port: 22,
            user: "courier".to_string(),
            password: Secret::new("secret"),
            remote_dir: "/incoming".to_string(),
            host_key_policy: HostKeyPolicy::Disabled,
            connect_timeout: Duration::from_secs(1),
            upload_timeout: Duration::from_secs(5),
            cleanup_order,
        },
        notifications: NotificationConfig {
            service_name: "rsuite-prime-transfer".to_string(),
            subject: "rsuite-prime-transfer update".to_string(),
            webhook_url: None,
        },
        logging: LoggingSettings {
            level: "info".to_string(),
            format: None,
        },
    }
}
