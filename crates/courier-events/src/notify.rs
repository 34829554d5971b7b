//! Outbound notifications and the sink seam they are delivered through.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::NotifyError;

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// Routine progress.
    #[serde(rename = "INFO")]
    Info,
    /// A failure operators should look at.
    #[serde(rename = "ERROR")]
    Error,
}

impl Severity {
    /// Wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Error => "ERROR",
        }
    }
}

/// Message delivered to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Emitting service name.
    pub service: String,
    /// Severity level.
    pub severity: Severity,
    /// Short subject line.
    pub subject: String,
    /// Free-form body.
    pub body: String,
}

impl Notification {
    /// Informational notification.
    #[must_use]
    pub fn info(service: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            severity: Severity::Info,
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Error notification.
    #[must_use]
    pub fn error(service: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            severity: Severity::Error,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Destination for operator notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification.
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_serializes_as_upper_case_label() -> Result<(), serde_json::Error> {
        let note = Notification::error("rsuite-prime-transfer", "rsuite-prime-transfer update", "boom");
        let value = serde_json::to_value(&note)?;
        assert_eq!(value["severity"], "ERROR");
        assert_eq!(value["service"], "rsuite-prime-transfer");
        assert_eq!(Severity::Info.as_str(), "INFO");
        Ok(())
    }
}
