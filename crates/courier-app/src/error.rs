//! # Design
//!
//! - Centralize application-level errors for bootstrap and job orchestration.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::error::Error as StdError;
use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading or validation failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: courier_config::ConfigError,
    },
    /// Telemetry setup failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: courier_telemetry::TelemetryError,
    },
    /// Local packaging, classification or cleanup failed.
    #[error("filesystem operation failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        source: courier_fsops::FsOpsError,
    },
    /// Remote upload failed.
    #[error("transfer operation failed")]
    Transfer {
        /// Operation identifier.
        operation: &'static str,
        /// Source transfer error.
        source: courier_transfer::TransferError,
    },
    /// Reading the inbound payload source failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved, when the source is a file.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
    /// HTTP client construction failed.
    #[error("http operation failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// URL the client targets.
        url: String,
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// A blocking task panicked or was cancelled.
    #[error("blocking task failed")]
    Join {
        /// Operation identifier.
        operation: &'static str,
        /// Source join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: courier_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: courier_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn fsops(operation: &'static str, source: courier_fsops::FsOpsError) -> Self {
        Self::FsOps { operation, source }
    }

    pub(crate) const fn transfer(
        operation: &'static str,
        source: courier_transfer::TransferError,
    ) -> Self {
        Self::Transfer { operation, source }
    }

    pub(crate) const fn io(
        operation: &'static str,
        path: Option<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Io {
            operation,
            path,
            source,
        }
    }

    /// Operation tag carried by every variant.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Config { operation, .. }
            | Self::Telemetry { operation, .. }
            | Self::FsOps { operation, .. }
            | Self::Transfer { operation, .. }
            | Self::Io { operation, .. }
            | Self::Http { operation, .. }
            | Self::Join { operation, .. } => operation,
        }
    }
}

/// Render an error and its source chain on one line for notification bodies.
pub(crate) fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(source) = current {
        let _ = write!(rendered, ": {source}");
        current = source.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_walks_the_source_chain() {
        let err = AppError::io(
            "payloads.read",
            None,
            io::Error::new(io::ErrorKind::UnexpectedEof, "stream ended"),
        );
        assert_eq!(err.to_string(), "io operation failed");
        assert_eq!(err.operation(), "payloads.read");
        assert_eq!(describe(&err), "io operation failed: stream ended");
    }

    #[test]
    fn describe_includes_nested_sources() {
        let err = AppError::transfer(
            "rrd.upload",
            courier_transfer::TransferError::Io {
                operation: "sftp.write",
                path: PathBuf::from("/incoming/B1.zip"),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"),
            },
        );
        assert_eq!(
            describe(&err),
            "transfer operation failed: transfer io failure: pipe closed"
        );
    }
}
