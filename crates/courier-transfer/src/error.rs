//! # Design
//!
//! - Constant-message errors for share and SFTP uploads.
//! - Operation tags identify the failing step; hosts and paths travel as fields.
//! - Timeouts are first-class so callers can tell a stalled remote from a refusal.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for remote transfers.
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors produced while moving a file to a remote destination.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Local or share-side IO failure.
    #[error("transfer io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Name resolution or TCP connection failure.
    #[error("transfer network failure")]
    Network {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Host being contacted.
        host: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Failure reported by the SSH library.
    #[error("transfer ssh failure")]
    Ssh {
        /// Operation that triggered the SSH failure.
        operation: &'static str,
        /// Underlying SSH error.
        source: ssh2::Error,
    },
    /// The remote host could not be trusted.
    #[error("transfer host key rejected")]
    HostKey {
        /// Static reason for the rejection.
        reason: &'static str,
        /// Host that presented the key.
        host: String,
    },
    /// The remote side violated an expectation without a library error.
    #[error("transfer protocol failure")]
    Protocol {
        /// Operation that failed.
        operation: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A logical remote path failed validation.
    #[error("transfer invalid remote path")]
    InvalidPath {
        /// Static reason for the rejection.
        reason: &'static str,
        /// Offending value.
        value: String,
    },
    /// The operation exceeded its deadline.
    #[error("transfer timed out")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Deadline that elapsed.
        after: Duration,
    },
    /// A blocking transfer task panicked or was cancelled.
    #[error("transfer task failed")]
    Join {
        /// Operation that was running.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl TransferError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn network(operation: &'static str, host: &str, source: io::Error) -> Self {
        Self::Network {
            operation,
            host: host.to_string(),
            source,
        }
    }

    pub(crate) const fn ssh(operation: &'static str, source: ssh2::Error) -> Self {
        Self::Ssh { operation, source }
    }

    pub(crate) const fn protocol(
        operation: &'static str,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::Protocol {
            operation,
            reason,
            value,
        }
    }

    /// Whether the failure was a deadline expiry.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
