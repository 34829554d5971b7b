//! Uploads into a mounted SMB share.
//!
//! The share is expected to be mounted (CIFS) under `root`; authentication belongs to the
//! mount. Each upload creates missing directories, truncates or creates the target, streams
//! the local file across and syncs before reporting success.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{self, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::error::{TransferError, TransferResult};
use crate::gateway::{RemoteGateway, UploadReceipt};
use crate::remote_path::RemotePath;

/// Gateway writing beneath a mounted share root.
#[derive(Debug, Clone)]
pub struct ShareGateway {
    root: PathBuf,
    io_timeout: Duration,
}

impl ShareGateway {
    /// Create a gateway rooted at `root` with a per-upload deadline.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            io_timeout,
        }
    }

    /// Share root uploads are mapped under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn copy(&self, local: &Path, remote: &RemotePath) -> TransferResult<UploadReceipt> {
        let target = remote.under(&self.root);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| TransferError::io("share.create_dir", parent, err))?;
        }

        let input = File::open(local)
            .await
            .map_err(|err| TransferError::io("share.open_local", local, err))?;
        let mut output = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&target)
            .await
            .map_err(|err| TransferError::io("share.create_file", &target, err))?;

        let bytes = io::copy(&mut BufReader::new(input), &mut output)
            .await
            .map_err(|err| TransferError::io("share.copy", &target, err))?;
        output
            .flush()
            .await
            .map_err(|err| TransferError::io("share.flush", &target, err))?;
        output
            .sync_all()
            .await
            .map_err(|err| TransferError::io("share.sync", &target, err))?;

        debug!(target = %target.display(), bytes, "share upload complete");
        Ok(UploadReceipt {
            remote: target.display().to_string(),
            bytes,
        })
    }
}

#[async_trait]
impl RemoteGateway for ShareGateway {
    fn name(&self) -> &'static str {
        "share"
    }

    async fn upload(&self, local: &Path, remote: &RemotePath) -> TransferResult<UploadReceipt> {
        tokio::time::timeout(self.io_timeout, self.copy(local, remote))
            .await
            .map_err(|_| TransferError::Timeout {
                operation: "share.upload",
                after: self.io_timeout,
            })?
    }
}
