//! Upload seam shared by every remote destination.

use std::path::Path;

use async_trait::async_trait;

use crate::error::TransferResult;
use crate::remote_path::RemotePath;

/// Confirmation returned by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Remote location as reported by the gateway.
    pub remote: String,
    /// Bytes written to the remote.
    pub bytes: u64,
}

/// Capability to copy one local file to a logical remote path.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Short label for logs and metrics.
    fn name(&self) -> &'static str;

    /// Upload `local` to `remote`.
    async fn upload(&self, local: &Path, remote: &RemotePath) -> TransferResult<UploadReceipt>;
}
