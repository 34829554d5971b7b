//! Error primitives for inbound event decoding and notification delivery.

use thiserror::Error;

/// Reasons an inbound transfer payload is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// Payload bytes were not valid UTF-8.
    #[error("transfer payload is not valid utf-8")]
    InvalidUtf8,
    /// Payload did not contain the path/tag delimiter.
    #[error("transfer payload is missing its delimiter")]
    MissingDelimiter,
    /// One side of the delimiter was empty.
    #[error("transfer payload field is empty")]
    EmptyField {
        /// Field that was empty.
        field: &'static str,
    },
    /// Source path could not be confined beneath the data root.
    #[error("transfer payload path is invalid")]
    InvalidPath {
        /// Static reason for the rejection.
        reason: &'static str,
        /// Offending path value.
        value: String,
    },
}

/// Result alias for event decoding.
pub type EventResult<T> = Result<T, EventError>;

/// Failure reported by a notification sink.
#[derive(Debug, Error)]
#[error("notification delivery failed")]
pub struct NotifyError {
    /// Sink that failed to deliver.
    pub sink: &'static str,
    /// Underlying delivery error.
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn notify_error_preserves_source() {
        let err = NotifyError {
            sink: "webhook",
            source: Box::new(io::Error::other("connection refused")),
        };
        assert_eq!(err.to_string(), "notification delivery failed");
        assert!(err.source().is_some());
    }

    #[test]
    fn event_error_messages_are_constant() {
        let err = EventError::InvalidPath {
            reason: "parent_segment",
            value: "../etc".into(),
        };
        assert_eq!(err.to_string(), "transfer payload path is invalid");
    }
}
