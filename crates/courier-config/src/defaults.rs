//! Configuration keys and default values.
//!
//! # Design
//! - Key names match the variables the deployment already exports.
//! - Optional tuning keys share the `COURIER_` prefix.

/// Local root that inbound relative paths are resolved against.
pub const DATA_DIRECTORY: &str = "DATA_DIRECTORY";
/// Mounted share root receiving manifest files.
pub const MANIFEST_SHARE: &str = "DIRECTORY_MANIFESTFILE_URL";
/// Mounted share root receiving payload files.
pub const PAYLOAD_SHARE: &str = "DIRECTORY_PDFFILE_URL";
/// Vendor SFTP host.
pub const SFTP_HOST: &str = "RRD_SFTP_HOST";
/// Vendor SFTP port.
pub const SFTP_PORT: &str = "RRD_SFTP_PORT";
/// Vendor SFTP user.
pub const SFTP_USER: &str = "RRD_SFTP_USER";
/// Vendor SFTP password.
pub const SFTP_PASS: &str = "RRD_SFTP_PASS";
/// Remote directory uploads land in.
pub const SFTP_REMOTE_DIR: &str = "RRD_SFTP_REMOTE_DIR";

pub(crate) const PAYLOAD_SUBDIR: &str = "COURIER_PAYLOAD_SUBDIR";
pub(crate) const MANIFEST_SUFFIX: &str = "COURIER_MANIFEST_SUFFIX";
pub(crate) const ROUTING_KEY_OFFSET: &str = "COURIER_ROUTING_KEY_OFFSET";
pub(crate) const ROUTING_KEY_WIDTH: &str = "COURIER_ROUTING_KEY_WIDTH";
pub(crate) const SHARE_TIMEOUT_SECS: &str = "COURIER_SHARE_TIMEOUT_SECS";
pub(crate) const HOST_KEY_POLICY: &str = "COURIER_SFTP_HOST_KEY_POLICY";
pub(crate) const SFTP_CONNECT_TIMEOUT_SECS: &str = "COURIER_SFTP_CONNECT_TIMEOUT_SECS";
pub(crate) const SFTP_UPLOAD_TIMEOUT_SECS: &str = "COURIER_SFTP_UPLOAD_TIMEOUT_SECS";
pub(crate) const RRD_CLEANUP_ORDER: &str = "COURIER_RRD_CLEANUP_ORDER";
pub(crate) const SERVICE_NAME: &str = "COURIER_SERVICE_NAME";
pub(crate) const NOTIFY_WEBHOOK: &str = "COURIER_NOTIFY_WEBHOOK";
pub(crate) const LOG_LEVEL: &str = "COURIER_LOG_LEVEL";
pub(crate) const LOG_FORMAT: &str = "COURIER_LOG_FORMAT";

/// Environment variable naming an optional YAML configuration file.
pub const CONFIG_FILE_ENV: &str = "COURIER_CONFIG";

pub(crate) const DEFAULT_PAYLOAD_SUBDIR: &str = "ProdPDFs";
pub(crate) const DEFAULT_MANIFEST_SUFFIX: &str = ".txt";
pub(crate) const DEFAULT_ROUTING_KEY_OFFSET: usize = 10;
pub(crate) const DEFAULT_ROUTING_KEY_WIDTH: usize = 6;
pub(crate) const DEFAULT_SHARE_TIMEOUT_SECS: u64 = 120;
pub(crate) const DEFAULT_SFTP_CONNECT_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_SFTP_UPLOAD_TIMEOUT_SECS: u64 = 600;
pub(crate) const DEFAULT_SERVICE_NAME: &str = "rsuite-prime-transfer";
pub(crate) const DEFAULT_LOG_LEVEL: &str = "info";
