//! In-memory fakes for the gateway and notification seams.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use courier_events::{Notification, NotificationSink, NotifyError, Severity};
use courier_transfer::{RemoteGateway, RemotePath, TransferError, TransferResult, UploadReceipt};

/// Upload captured by [`MemoryGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    /// Logical remote path.
    pub remote: String,
    /// Uploaded contents.
    pub contents: Vec<u8>,
}

/// Gateway that keeps uploads in memory and can fail chosen files.
#[derive(Debug, Clone)]
pub struct MemoryGateway {
    name: &'static str,
    uploads: Arc<Mutex<Vec<RecordedUpload>>>,
    failing: Arc<HashSet<String>>,
}

impl MemoryGateway {
    /// Gateway reporting the given name.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            uploads: Arc::default(),
            failing: Arc::default(),
        }
    }

    /// Gateway that rejects uploads whose remote file name is in `names`.
    #[must_use]
    pub fn failing_for<I, S>(name: &'static str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name,
            uploads: Arc::default(),
            failing: Arc::new(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Uploads recorded so far, in order.
    #[must_use]
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.lock().clone()
    }

    /// Remote paths recorded so far, in order.
    #[must_use]
    pub fn remotes(&self) -> Vec<String> {
        self.lock().iter().map(|upload| upload.remote.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedUpload>> {
        self.uploads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn upload(&self, local: &Path, remote: &RemotePath) -> TransferResult<UploadReceipt> {
        if self.failing.contains(remote.file_name()) {
            return Err(TransferError::Protocol {
                operation: "memory.upload",
                reason: "injected",
                value: Some(remote.to_string()),
            });
        }
        let contents = tokio::fs::read(local)
            .await
            .map_err(|source| TransferError::Io {
                operation: "memory.read_local",
                path: local.to_path_buf(),
                source,
            })?;
        let bytes = contents.len() as u64;
        self.lock().push(RecordedUpload {
            remote: remote.to_string(),
            contents,
        });
        Ok(UploadReceipt {
            remote: format!("memory://{remote}"),
            bytes,
        })
    }
}

/// Gateway that rejects every upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingGateway;

#[async_trait]
impl RemoteGateway for FailingGateway {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn upload(&self, _local: &Path, remote: &RemotePath) -> TransferResult<UploadReceipt> {
        Err(TransferError::Protocol {
            operation: "failing.upload",
            reason: "unavailable",
            value: Some(remote.to_string()),
        })
    }
}

/// Notification sink that records every delivery and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notes: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Sink that records and succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that records and then reports a delivery failure.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            notes: Arc::default(),
            fail: true,
        }
    }

    /// Notifications delivered so far.
    #[must_use]
    pub fn notes(&self) -> Vec<Notification> {
        self.notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Notifications of one severity.
    #[must_use]
    pub fn with_severity(&self, severity: Severity) -> Vec<Notification> {
        self.notes()
            .into_iter()
            .filter(|note| note.severity == severity)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        if self.fail {
            return Err(NotifyError {
                sink: "recording",
                source: "injected delivery failure".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::temp_dir;

    #[tokio::test]
    async fn memory_gateway_records_and_fails_selected_files() -> anyhow::Result<()> {
        let dir = temp_dir()?;
        let local = dir.path().join("doc.pdf");
        std::fs::write(&local, b"abc")?;
        let gateway = MemoryGateway::failing_for("share", ["bad.pdf"]);

        let receipt = gateway.upload(&local, &RemotePath::file("doc.pdf")?).await?;
        assert_eq!(receipt.bytes, 3);
        assert!(gateway.upload(&local, &RemotePath::file("bad.pdf")?).await.is_err());
        assert_eq!(gateway.remotes(), vec!["doc.pdf".to_string()]);
        assert!(FailingGateway.upload(&local, &RemotePath::file("doc.pdf")?).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn failing_notifier_still_records() {
        let sink = RecordingNotifier::failing();
        let note = Notification::info("svc", "svc update", "body");
        assert!(sink.notify(&note).await.is_err());
        assert_eq!(sink.notes(), vec![note]);
    }
}
