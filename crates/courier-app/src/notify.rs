//! Notification sinks and the fire-and-forget fan-out used by jobs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_config::NotificationConfig;
use courier_events::{Notification, NotificationSink, NotifyError, Severity};
use reqwest::Client;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Sink that writes every notification to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification.severity {
            Severity::Info => info!(
                service = %notification.service,
                subject = %notification.subject,
                body = %notification.body,
                "notification"
            ),
            Severity::Error => error!(
                service = %notification.service,
                subject = %notification.subject,
                body = %notification.body,
                "notification"
            ),
        }
        Ok(())
    }
}

/// Sink that POSTs the JSON-encoded notification to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Build a notifier targeting `url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(url: impl Into<String>) -> AppResult<Self> {
        let url = url.into();
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|source| AppError::Http {
                operation: "webhook.client",
                url: url.clone(),
                source,
            })?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map(|_| ())
            .map_err(|err| NotifyError {
                sink: "webhook",
                source: Box::new(err),
            })
    }
}

/// Fan-out over the configured sinks, stamped with the service name and subject.
#[derive(Clone)]
pub struct Notifier {
    service: String,
    subject: String,
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl Notifier {
    /// Notifier delivering to `sinks` in order.
    #[must_use]
    pub fn new(config: &NotificationConfig, sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self {
            service: config.service_name.clone(),
            subject: config.subject.clone(),
            sinks,
        }
    }

    /// Log-only notifier plus a webhook when one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error when the webhook client cannot be constructed.
    pub fn from_config(config: &NotificationConfig) -> AppResult<Self> {
        let mut sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(TracingNotifier)];
        if let Some(url) = &config.webhook_url {
            sinks.push(Arc::new(WebhookNotifier::new(url.clone())?));
        }
        Ok(Self::new(config, sinks))
    }

    /// Deliver an `INFO` notification.
    pub async fn info(&self, body: impl Into<String>) {
        let note = Notification::info(&self.service, &self.subject, body);
        self.deliver(&note).await;
    }

    /// Deliver an `ERROR` notification.
    pub async fn error(&self, body: impl Into<String>) {
        let note = Notification::error(&self.service, &self.subject, body);
        self.deliver(&note).await;
    }

    async fn deliver(&self, note: &Notification) {
        for sink in &self.sinks {
            if let Err(err) = sink.notify(note).await {
                warn!(
                    sink = err.sink,
                    error = %err,
                    cause = %err.source,
                    severity = note.severity.as_str(),
                    "notification delivery failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_test_support::mocks::RecordingNotifier;

    fn config() -> NotificationConfig {
        NotificationConfig {
            service_name: "rsuite-prime-transfer".into(),
            subject: "rsuite-prime-transfer update".into(),
            webhook_url: None,
        }
    }

    #[tokio::test]
    async fn failing_sink_does_not_stop_later_sinks() {
        let failing = RecordingNotifier::failing();
        let healthy = RecordingNotifier::new();
        let notifier = Notifier::new(
            &config(),
            vec![Arc::new(failing.clone()), Arc::new(healthy.clone())],
        );

        notifier.error("archive failed").await;

        assert_eq!(failing.notes().len(), 1);
        let delivered = healthy.with_severity(Severity::Error);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].subject, "rsuite-prime-transfer update");
        assert_eq!(delivered[0].body, "archive failed");
    }

    #[tokio::test]
    async fn tracing_notifier_never_fails() {
        let note = Notification::info("svc", "svc update", "done");
        assert!(TracingNotifier.notify(&note).await.is_ok());
    }

    #[test]
    fn from_config_adds_webhook_when_configured() -> AppResult<()> {
        let mut config = config();
        assert_eq!(Notifier::from_config(&config)?.sinks.len(), 1);
        config.webhook_url = Some("http://127.0.0.1:9/hooks/courier".into());
        assert_eq!(Notifier::from_config(&config)?.sinks.len(), 2);
        Ok(())
    }
}
