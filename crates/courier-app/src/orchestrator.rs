//! Transfer orchestration: one inbound event in, one routed batch out.
//!
//! # Design
//! - `handle` never returns an error; every failure ends in a log line, a notification,
//!   and exactly one `JobFinished` event.
//! - Jobs on the same source directory serialize on a path lock; distinct directories run
//!   concurrently.
//! - Blocking filesystem work runs on the blocking pool.

use std::sync::Arc;
use std::time::Instant;

use courier_config::{CleanupOrder, CourierConfig};
use courier_events::{
    Event, EventBus, EventError, JobOutcome, LandingZone, ResolvedJob, TransferEvent,
};
use courier_fsops::{
    ArchiveReport, FsOpsResult, RoutingKeyRule, SourceFile, SplitRules, classify, create_archive,
    remove_file, remove_tree,
};
use courier_telemetry::{Metrics, job_span};
use courier_transfer::{RemoteGateway, RemotePath, SftpGateway, ShareGateway, TransferResult};
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult, describe};
use crate::locks::{PathGuard, PathLocks};
use crate::notify::Notifier;

const UNPARSED_ZONE: &str = "unparsed";

/// Collaborators the orchestrator delivers through.
pub struct OrchestratorDeps {
    /// Gateway for Prime manifest files.
    pub manifest_gateway: Arc<dyn RemoteGateway>,
    /// Gateway for Prime payload files.
    pub payload_gateway: Arc<dyn RemoteGateway>,
    /// Gateway for RRD archives.
    pub archive_gateway: Arc<dyn RemoteGateway>,
    /// Operator notifications.
    pub notifier: Notifier,
    /// Bus receiving job and file events.
    pub events: EventBus,
    /// Counters and gauges.
    pub metrics: Metrics,
}

impl OrchestratorDeps {
    /// Production gateways and notifier built from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the webhook client cannot be constructed.
    pub fn from_config(
        config: &CourierConfig,
        events: EventBus,
        metrics: Metrics,
    ) -> AppResult<Self> {
        Ok(Self {
            manifest_gateway: Arc::new(ShareGateway::new(
                config.prime.manifest_root.clone(),
                config.prime.io_timeout,
            )),
            payload_gateway: Arc::new(ShareGateway::new(
                config.prime.payload_root.clone(),
                config.prime.io_timeout,
            )),
            archive_gateway: Arc::new(SftpGateway::from_config(&config.rrd)),
            notifier: Notifier::from_config(&config.notifications)?,
            events,
            metrics,
        })
    }
}

/// Routes decoded transfer events to the Prime share or the RRD host.
pub struct TransferOrchestrator {
    config: Arc<CourierConfig>,
    manifest_gateway: Arc<dyn RemoteGateway>,
    payload_gateway: Arc<dyn RemoteGateway>,
    archive_gateway: Arc<dyn RemoteGateway>,
    notifier: Notifier,
    events: EventBus,
    metrics: Metrics,
    locks: PathLocks,
}

impl TransferOrchestrator {
    /// Assemble an orchestrator from validated configuration and its collaborators.
    #[must_use]
    pub fn new(config: CourierConfig, deps: OrchestratorDeps) -> Self {
        Self {
            config: Arc::new(config),
            manifest_gateway: deps.manifest_gateway,
            payload_gateway: deps.payload_gateway,
            archive_gateway: deps.archive_gateway,
            notifier: deps.notifier,
            events: deps.events,
            metrics: deps.metrics,
            locks: PathLocks::new(),
        }
    }

    /// Bus carrying job progress; subscribe before `handle` to observe one job's completion.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Metrics registry updated by every job.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Process one raw inbound payload to completion under a fresh job id.
    pub async fn handle(&self, payload: &[u8]) {
        self.handle_with_id(Uuid::new_v4(), payload).await;
    }

    /// Process one payload under a caller-chosen job id.
    ///
    /// Every outcome, `Rejected` and `Ignored` included, is published as a `JobFinished`
    /// carrying `job_id`, so a caller can await it with
    /// [`wait_for_finish`](courier_events::wait_for_finish).
    pub async fn handle_with_id(&self, job_id: Uuid, payload: &[u8]) {
        let started = Instant::now();
        match TransferEvent::decode(payload) {
            Ok(event) => {
                let job = event.resolve(job_id, &self.config.data_root);
                let span = job_span(&job_id.to_string(), job.zone.label());
                self.run(job, started).instrument(span).await;
            }
            Err(err) => {
                let span = job_span(&job_id.to_string(), UNPARSED_ZONE);
                self.reject(job_id, payload, &err, started)
                    .instrument(span)
                    .await;
            }
        }
    }

    async fn reject(&self, job_id: Uuid, payload: &[u8], err: &EventError, started: Instant) {
        let shown = String::from_utf8_lossy(payload);
        error!(payload = %shown, error = %err, detail = ?err, "malformed transfer event");
        self.notifier
            .error(format!("Rejected malformed transfer event {shown:?}: {err:?}"))
            .await;
        self.finish(
            job_id,
            UNPARSED_ZONE,
            JobReport::new(JobOutcome::Rejected, Some(err.to_string())),
            started,
        );
    }

    async fn run(&self, job: ResolvedJob, started: Instant) {
        let (report, active) = match &job.zone {
            LandingZone::Unrecognized(tag) => {
                error!(
                    tag = %tag,
                    source = %job.source_dir.display(),
                    "incorrect landing zone"
                );
                (
                    JobReport::new(JobOutcome::Ignored, Some(tag.clone())),
                    None,
                )
            }
            LandingZone::Prime => {
                let active = self.begin(&job).await;
                (self.run_prime(&job).await, Some(active))
            }
            LandingZone::Rrd => {
                let active = self.begin(&job).await;
                (self.run_rrd(&job).await, Some(active))
            }
        };
        self.finish(job.job_id, job.zone.label(), report, started);
        drop(active);
    }

    async fn begin(&self, job: &ResolvedJob) -> ActiveJob {
        let path = self.locks.acquire(&job.source_dir).await;
        self.metrics.job_started();
        let _ = self.events.publish(Event::JobStarted {
            job_id: job.job_id,
            zone: job.zone.label().to_string(),
            source: job.source_dir.display().to_string(),
        });
        info!(source = %job.source_dir.display(), "transfer job started");
        ActiveJob {
            _path: path,
            metrics: self.metrics.clone(),
        }
    }

    fn finish(&self, job_id: Uuid, zone: &str, report: JobReport, started: Instant) {
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let outcome = report.outcome;
        self.metrics.inc_job(zone, outcome.as_str());
        let _ = self.events.publish(Event::JobFinished {
            job_id,
            outcome,
            detail: report.detail,
        });
        info!(outcome = outcome.as_str(), elapsed_ms, "transfer job finished");
    }

    fn split_rules(&self) -> SplitRules {
        SplitRules {
            manifest_suffix: self.config.prime.manifest_suffix.clone(),
            routing_key: RoutingKeyRule {
                offset: self.config.prime.routing_key_offset,
                width: self.config.prime.routing_key_width,
            },
        }
    }

    async fn run_prime(&self, job: &ResolvedJob) -> JobReport {
        let rules = self.split_rules();
        let source = job.source_dir.clone();
        let split = match blocking("prime.classify", move || classify(&source, &rules)).await {
            Ok(split) => split,
            Err(err) => {
                let body = format!(
                    "Failed to list Prime source directory {}: {}",
                    job.source_dir.display(),
                    describe(&err)
                );
                error!(error = %err, detail = %body, "prime listing failed");
                self.notifier.error(body.clone()).await;
                return JobReport::new(JobOutcome::Failed, Some(body));
            }
        };
        if split.is_empty() {
            info!("source directory is empty; nothing to transfer");
            return JobReport::new(JobOutcome::Completed, None);
        }

        let mut failures = Vec::new();

        let mut manifests = GroupTally::default();
        for file in &split.manifests {
            let remote = RemotePath::file(&file.name);
            let result = self
                .deliver_file(job, FileGroup::Manifest, self.manifest_gateway.as_ref(), file, remote)
                .await;
            manifests.record(result, &mut failures);
        }
        self.summarize(job, FileGroup::Manifest, &manifests).await;

        let mut payloads = GroupTally::default();
        for rejected in &split.rejected {
            let file = rejected
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let body = format!(
                "Skipped Prime file {file} in {}: {}",
                job.source_dir.display(),
                describe(&rejected.error)
            );
            let body = self
                .fail_file(job, FileGroup::Payload, &file, "rejected", body)
                .await;
            payloads.record(Err(body), &mut failures);
        }
        let subdir = self.config.prime.payload_subdir.as_str();
        for payload in &split.payloads {
            let remote = RemotePath::from_segments([
                payload.routing_key.as_str(),
                subdir,
                payload.file.name.as_str(),
            ]);
            let result = self
                .deliver_file(
                    job,
                    FileGroup::Payload,
                    self.payload_gateway.as_ref(),
                    &payload.file,
                    remote,
                )
                .await;
            payloads.record(result, &mut failures);
        }
        self.summarize(job, FileGroup::Payload, &payloads).await;

        match failures.into_iter().next() {
            None => JobReport::new(JobOutcome::Completed, None),
            Some(first) => JobReport::new(JobOutcome::Degraded, Some(first)),
        }
    }

    /// Upload one Prime file and delete it locally once the upload is confirmed.
    async fn deliver_file(
        &self,
        job: &ResolvedJob,
        group: FileGroup,
        gateway: &dyn RemoteGateway,
        file: &SourceFile,
        remote: TransferResult<RemotePath>,
    ) -> Result<(), String> {
        let uploaded = async {
            let remote = remote.map_err(|err| AppError::transfer("prime.remote_path", err))?;
            gateway
                .upload(&file.path, &remote)
                .await
                .map_err(|err| AppError::transfer("prime.upload", err))
        }
        .await;

        let receipt = match uploaded {
            Ok(receipt) => receipt,
            Err(err) => {
                let body = format!(
                    "Failed to transfer {} file {} from {}: {}",
                    group.as_str(),
                    file.name,
                    job.source_dir.display(),
                    describe(&err)
                );
                return Err(self.fail_file(job, group, &file.name, "failed", body).await);
            }
        };

        self.metrics.add_uploaded_bytes(gateway.name(), receipt.bytes);
        debug!(
            file = %file.name,
            remote = %receipt.remote,
            bytes = receipt.bytes,
            "file transferred"
        );
        let _ = self.events.publish(Event::FileTransferred {
            job_id: job.job_id,
            file: file.name.clone(),
            remote: receipt.remote,
            bytes: receipt.bytes,
        });

        let local = file.path.clone();
        if let Err(err) = blocking("prime.remove_file", move || remove_file(&local)).await {
            let body = format!(
                "Transferred {} file {} but could not delete it from {}: {}",
                group.as_str(),
                file.name,
                job.source_dir.display(),
                describe(&err)
            );
            return Err(self.fail_file(job, group, &file.name, "cleanup_failed", body).await);
        }
        self.metrics.inc_file(group.as_str(), "transferred");
        Ok(())
    }

    async fn fail_file(
        &self,
        job: &ResolvedJob,
        group: FileGroup,
        file: &str,
        status: &str,
        body: String,
    ) -> String {
        warn!(group = group.as_str(), file = %file, status, detail = %body, "file not transferred");
        self.metrics.inc_file(group.as_str(), status);
        let _ = self.events.publish(Event::FileFailed {
            job_id: job.job_id,
            file: file.to_string(),
            message: body.clone(),
        });
        self.notifier.error(body.clone()).await;
        body
    }

    async fn summarize(&self, job: &ResolvedJob, group: FileGroup, tally: &GroupTally) {
        if tally.total == 0 {
            return;
        }
        info!(
            group = group.as_str(),
            total = tally.total,
            processed = tally.processed,
            failed = tally.failed,
            "group processed"
        );
        self.notifier
            .info(format!(
                "Processed {} files from {}: total {}, processed {}, failed {}",
                group.as_str(),
                job.source_dir.display(),
                tally.total,
                tally.processed,
                tally.failed
            ))
            .await;
    }

    async fn run_rrd(&self, job: &ResolvedJob) -> JobReport {
        let container = job.archive_path.clone();
        let source = job.source_dir.clone();
        let report = match blocking("rrd.archive", move || create_archive(&container, &source))
            .await
        {
            Ok(report) => report,
            Err(err) => {
                let body = format!(
                    "Failed to archive RRD source directory {}: {}",
                    job.source_dir.display(),
                    describe(&err)
                );
                error!(error = %err, detail = %body, "archive failed");
                self.notifier.error(body.clone()).await;
                return JobReport::new(JobOutcome::Failed, Some(body));
            }
        };
        info!(
            archive = %report.path.display(),
            entries = report.entries,
            bytes = report.bytes,
            sha256 = %report.sha256,
            "archive created"
        );

        let outcome = match self.config.rrd.cleanup_order {
            CleanupOrder::AfterUpload => match self.upload_archive(job, &report, true).await {
                Ok(()) => self.remove_source(job).await,
                Err(body) => Err(body),
            },
            CleanupOrder::BeforeUpload => {
                warn!(
                    source = %job.source_dir.display(),
                    "source directory is removed before upload; a failed upload loses the batch"
                );
                match self.remove_source(job).await {
                    Ok(()) => self.upload_archive(job, &report, false).await,
                    Err(body) => Err(body),
                }
            }
        };
        match outcome {
            Ok(()) => JobReport::new(JobOutcome::Completed, None),
            Err(body) => JobReport::new(JobOutcome::Failed, Some(body)),
        }
    }

    async fn upload_archive(
        &self,
        job: &ResolvedJob,
        report: &ArchiveReport,
        source_retained: bool,
    ) -> Result<(), String> {
        let file_name = job.archive_file_name();
        let uploaded = async {
            let remote =
                RemotePath::file(&file_name).map_err(|err| AppError::transfer("rrd.remote_path", err))?;
            self.archive_gateway
                .upload(&report.path, &remote)
                .await
                .map_err(|err| AppError::transfer("rrd.upload", err))
        }
        .await;

        match uploaded {
            Ok(receipt) => {
                self.metrics
                    .add_uploaded_bytes(self.archive_gateway.name(), receipt.bytes);
                self.metrics.inc_file(FileGroup::Archive.as_str(), "transferred");
                info!(remote = %receipt.remote, bytes = receipt.bytes, "archive uploaded");
                let _ = self.events.publish(Event::FileTransferred {
                    job_id: job.job_id,
                    file: file_name.clone(),
                    remote: receipt.remote,
                    bytes: receipt.bytes,
                });
                self.notifier
                    .info(format!(
                        "Uploaded {file_name} to RRD ({} bytes)",
                        receipt.bytes
                    ))
                    .await;
                Ok(())
            }
            Err(err) => {
                let state = if source_retained {
                    "source directory retained"
                } else {
                    "source directory already removed"
                };
                let body = format!(
                    "Failed to upload {file_name} to RRD ({state} at {}): {}",
                    job.source_dir.display(),
                    describe(&err)
                );
                error!(error = %err, detail = %body, "archive upload failed");
                Err(self
                    .fail_file(job, FileGroup::Archive, &file_name, "failed", body)
                    .await)
            }
        }
    }

    async fn remove_source(&self, job: &ResolvedJob) -> Result<(), String> {
        let source = job.source_dir.clone();
        match blocking("rrd.cleanup", move || remove_tree(&source)).await {
            Ok(()) => {
                info!(source = %job.source_dir.display(), "source directory removed");
                Ok(())
            }
            Err(err) => {
                let body = format!(
                    "Failed to remove RRD source directory {}: {}",
                    job.source_dir.display(),
                    describe(&err)
                );
                error!(error = %err, detail = %body, "source cleanup failed");
                self.notifier.error(body.clone()).await;
                Err(body)
            }
        }
    }
}

/// Holds the source path lock and the active-jobs gauge for one job.
struct ActiveJob {
    _path: PathGuard,
    metrics: Metrics,
}

impl Drop for ActiveJob {
    fn drop(&mut self) {
        self.metrics.job_finished();
    }
}

struct JobReport {
    outcome: JobOutcome,
    detail: Option<String>,
}

impl JobReport {
    const fn new(outcome: JobOutcome, detail: Option<String>) -> Self {
        Self { outcome, detail }
    }
}

#[derive(Debug, Clone, Copy)]
enum FileGroup {
    Manifest,
    Payload,
    Archive,
}

impl FileGroup {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::Payload => "payload",
            Self::Archive => "archive",
        }
    }
}

#[derive(Debug, Default)]
struct GroupTally {
    total: usize,
    processed: usize,
    failed: usize,
}

impl GroupTally {
    fn record(&mut self, result: Result<(), String>, failures: &mut Vec<String>) {
        self.total += 1;
        match result {
            Ok(()) => self.processed += 1,
            Err(body) => {
                self.failed += 1;
                failures.push(body);
            }
        }
    }
}

async fn blocking<T, F>(operation: &'static str, work: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> FsOpsResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|source| AppError::Join { operation, source })?
        .map_err(|err| AppError::fsops(operation, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use courier_events::{EventEnvelope, Severity, wait_for_finish};
    use courier_test_support::fixtures::{Sandbox, batch_dir};
    use courier_test_support::mocks::{FailingGateway, MemoryGateway, RecordingNotifier};

    type TestResult<T> = anyhow::Result<T>;

    #[derive(Clone, Default)]
    struct LogCapture {
        buffer: Arc<std::sync::Mutex<Vec<u8>>>,
    }

    impl LogCapture {
        fn lines(&self) -> Vec<String> {
            let buffer = self
                .buffer
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            String::from_utf8_lossy(&buffer)
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.buffer
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    const PAYLOAD_NAME: &str = "0000000000KEY001doc.pdf";

    struct Harness {
        sandbox: Sandbox,
        manifests: MemoryGateway,
        payloads: MemoryGateway,
        archives: MemoryGateway,
        notes: RecordingNotifier,
        orchestrator: Arc<TransferOrchestrator>,
    }

    impl Harness {
        fn new(order: CleanupOrder) -> TestResult<Self> {
            Self::build(order, MemoryGateway::new("share"), None)
        }

        fn build(
            order: CleanupOrder,
            payloads: MemoryGateway,
            archive_override: Option<Arc<dyn RemoteGateway>>,
        ) -> TestResult<Self> {
            let sandbox = Sandbox::new()?;
            let manifests = MemoryGateway::new("share");
            let archives = MemoryGateway::new("sftp");
            let notes = RecordingNotifier::new();
            let config = sandbox.config(order);
            let deps = OrchestratorDeps {
                manifest_gateway: Arc::new(manifests.clone()),
                payload_gateway: Arc::new(payloads.clone()),
                archive_gateway: archive_override
                    .unwrap_or_else(|| Arc::new(archives.clone()) as Arc<dyn RemoteGateway>),
                notifier: Notifier::new(&config.notifications, vec![Arc::new(notes.clone())]),
                events: EventBus::new(),
                metrics: Metrics::new()?,
            };
            Ok(Self {
                sandbox,
                manifests,
                payloads,
                archives,
                notes,
                orchestrator: Arc::new(TransferOrchestrator::new(config, deps)),
            })
        }

        fn batch(&self, relative: &str, files: &[(&str, &[u8])]) -> TestResult<std::path::PathBuf> {
            batch_dir(&self.sandbox.data_root, relative, files)
        }

        fn history(&self) -> Vec<EventEnvelope> {
            self.orchestrator.events().backlog_since(0)
        }

        fn outcomes(&self) -> Vec<JobOutcome> {
            self.history()
                .into_iter()
                .filter_map(|envelope| match envelope.event {
                    Event::JobFinished { outcome, .. } => Some(outcome),
                    _ => None,
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn prime_splits_groups_and_deletes_transferred_files() -> TestResult<()> {
        let harness = Harness::new(CleanupOrder::AfterUpload)?;
        let dir = harness.batch(
            "out/B1",
            &[("manifest.txt", b"manifest"), (PAYLOAD_NAME, b"%PDF-1.7")],
        )?;

        harness.orchestrator.handle(b"out/B1,Prime").await;

        assert_eq!(harness.manifests.remotes(), vec!["manifest.txt".to_string()]);
        assert_eq!(
            harness.payloads.remotes(),
            vec![format!("KEY001/ProdPDFs/{PAYLOAD_NAME}")]
        );
        assert_eq!(harness.payloads.uploads()[0].contents, b"%PDF-1.7");
        assert!(dir.is_dir(), "the source directory itself is kept");
        assert!(!dir.join("manifest.txt").exists());
        assert!(!dir.join(PAYLOAD_NAME).exists());
        assert_eq!(harness.outcomes(), vec![JobOutcome::Completed]);

        let summaries = harness.notes.with_severity(Severity::Info);
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].body.starts_with("Processed manifest files"));
        assert!(summaries[1].body.contains("total 1, processed 1, failed 0"));
        assert!(harness.notes.with_severity(Severity::Error).is_empty());
        assert_eq!(harness.orchestrator.metrics().job_count("prime", "completed"), 1);
        assert_eq!(harness.orchestrator.metrics().active_jobs(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn prime_short_payload_name_is_rejected_alone() -> TestResult<()> {
        let harness = Harness::new(CleanupOrder::AfterUpload)?;
        let dir = harness.batch(
            "out/B2",
            &[("manifest.txt", b"m"), ("short.pdf", b"p"), (PAYLOAD_NAME, b"q")],
        )?;

        harness.orchestrator.handle(b"out/B2,prime").await;

        assert_eq!(harness.manifests.remotes().len(), 1);
        assert_eq!(harness.payloads.remotes().len(), 1);
        assert!(dir.join("short.pdf").exists());
        assert_eq!(harness.outcomes(), vec![JobOutcome::Degraded]);

        let errors = harness.notes.with_severity(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].body.contains("short.pdf"));
        let infos = harness.notes.with_severity(Severity::Info);
        assert!(infos[1].body.contains("total 2, processed 1, failed 1"));
        assert_eq!(
            harness.orchestrator.metrics().file_count("payload", "rejected"),
            1
        );
        Ok(())
    }

    #[tokio::test]
    async fn prime_upload_failure_keeps_that_file_and_continues() -> TestResult<()> {
        let other = "0000000000KEY002other.pdf";
        let harness = Harness::build(
            CleanupOrder::AfterUpload,
            MemoryGateway::failing_for("share", [PAYLOAD_NAME]),
            None,
        )?;
        let dir = harness.batch("out/B3", &[(PAYLOAD_NAME, b"a"), (other, b"b")])?;

        harness.orchestrator.handle(b"out/B3,PRIME").await;

        assert!(dir.join(PAYLOAD_NAME).exists());
        assert!(!dir.join(other).exists());
        assert_eq!(
            harness.payloads.remotes(),
            vec![format!("KEY002/ProdPDFs/{other}")]
        );
        assert_eq!(harness.outcomes(), vec![JobOutcome::Degraded]);
        assert_eq!(harness.notes.with_severity(Severity::Error).len(), 1);
        assert!(
            harness
                .history()
                .iter()
                .any(|envelope| envelope.event.kind() == "file_failed")
        );
        Ok(())
    }

    #[tokio::test]
    async fn prime_unlistable_directory_fails_the_job() -> TestResult<()> {
        let harness = Harness::new(CleanupOrder::AfterUpload)?;

        harness.orchestrator.handle(b"out/missing,Prime").await;

        assert_eq!(harness.outcomes(), vec![JobOutcome::Failed]);
        assert_eq!(harness.notes.with_severity(Severity::Error).len(), 1);
        assert!(harness.manifests.remotes().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn prime_empty_directory_is_a_quiet_success() -> TestResult<()> {
        let harness = Harness::new(CleanupOrder::AfterUpload)?;
        let _ = harness.batch("out/empty", &[])?;

        harness.orchestrator.handle(b"out/empty,Prime").await;

        assert_eq!(harness.outcomes(), vec![JobOutcome::Completed]);
        assert!(harness.notes.notes().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn rrd_success_uploads_archive_and_removes_source() -> TestResult<()> {
        let harness = Harness::new(CleanupOrder::AfterUpload)?;
        let dir = harness.batch("out/B7", &[("a.txt", b"alpha"), ("b.pdf", b"bravo")])?;
        let mut stream = harness.orchestrator.events().subscribe();

        harness.orchestrator.handle(b"out/B7,rrd").await;

        let started = harness
            .history()
            .into_iter()
            .find_map(|envelope| match envelope.event {
                Event::JobStarted { job_id, .. } => Some(job_id),
                _ => None,
            })
            .ok_or_else(|| anyhow::anyhow!("job never started"))?;
        assert_eq!(
            wait_for_finish(&mut stream, started).await,
            Some(JobOutcome::Completed)
        );

        assert!(!dir.exists());
        let uploads = harness.archives.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].remote, "B7.zip");
        let local = fs::read(harness.sandbox.data_root.join("out").join("B7.zip"))?;
        assert_eq!(uploads[0].contents, local);

        let infos = harness.notes.with_severity(Severity::Info);
        assert_eq!(infos.len(), 1);
        assert!(infos[0].body.contains("B7.zip"));
        assert_eq!(harness.orchestrator.metrics().job_count("rrd", "completed"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn rrd_upload_failure_retains_source() -> TestResult<()> {
        let harness = Harness::build(
            CleanupOrder::AfterUpload,
            MemoryGateway::new("share"),
            Some(Arc::new(FailingGateway)),
        )?;
        let dir = harness.batch("out/B8", &[("a.txt", b"alpha")])?;

        harness.orchestrator.handle(b"out/B8,RRD").await;

        assert!(dir.join("a.txt").exists());
        assert_eq!(harness.outcomes(), vec![JobOutcome::Failed]);
        let errors = harness.notes.with_severity(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].body.contains("source directory retained"));
        Ok(())
    }

    #[tokio::test]
    async fn rrd_before_upload_order_removes_source_first() -> TestResult<()> {
        let harness = Harness::build(
            CleanupOrder::BeforeUpload,
            MemoryGateway::new("share"),
            Some(Arc::new(FailingGateway)),
        )?;
        let dir = harness.batch("out/B9", &[("a.txt", b"alpha")])?;

        harness.orchestrator.handle(b"out/B9,rrd").await;

        assert!(!dir.exists());
        assert_eq!(harness.outcomes(), vec![JobOutcome::Failed]);
        let errors = harness.notes.with_severity(Severity::Error);
        assert!(errors[0].body.contains("already removed"));
        Ok(())
    }

    #[tokio::test]
    async fn rrd_archive_failure_touches_nothing_remote() -> TestResult<()> {
        let harness = Harness::new(CleanupOrder::AfterUpload)?;

        harness.orchestrator.handle(b"out/absent,rrd").await;

        assert!(harness.archives.uploads().is_empty());
        assert_eq!(harness.outcomes(), vec![JobOutcome::Failed]);
        assert_eq!(harness.notes.with_severity(Severity::Error).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unrecognized_zone_has_no_side_effects() -> TestResult<()> {
        let harness = Harness::new(CleanupOrder::AfterUpload)?;
        let dir = harness.batch("out/B1", &[("manifest.txt", b"m")])?;

        harness.orchestrator.handle(b"out/B1,FTP").await;

        assert!(dir.join("manifest.txt").exists());
        assert!(!harness.sandbox.data_root.join("out").join("B1.zip").exists());
        assert!(harness.manifests.remotes().is_empty());
        assert!(harness.archives.uploads().is_empty());
        assert!(harness.notes.notes().is_empty());
        assert_eq!(harness.outcomes(), vec![JobOutcome::Ignored]);
        assert!(
            !harness
                .history()
                .iter()
                .any(|envelope| envelope.event.kind() == "job_started")
        );
        Ok(())
    }

    #[tokio::test]
    async fn unrecognized_zone_logs_exactly_one_error() -> TestResult<()> {
        let harness = Harness::new(CleanupOrder::AfterUpload)?;
        let _ = harness.batch("out/B1", &[("manifest.txt", b"m")])?;
        let capture = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        harness.orchestrator.handle(b"out/B1,FTP").await;

        let lines = capture.lines();
        let errors: Vec<&String> = lines.iter().filter(|line| line.contains("ERROR")).collect();
        assert_eq!(errors.len(), 1, "error records: {errors:?}");
        assert!(errors[0].contains("incorrect landing zone"));
        assert!(errors[0].contains("FTP"));
        Ok(())
    }

    #[tokio::test]
    async fn caller_id_correlates_ignored_and_rejected_outcomes() -> TestResult<()> {
        let harness = Harness::new(CleanupOrder::AfterUpload)?;
        let ignored = Uuid::new_v4();
        let rejected = Uuid::new_v4();
        let mut stream = harness.orchestrator.events().subscribe();

        let orchestrator = Arc::clone(&harness.orchestrator);
        let worker = tokio::spawn(async move {
            orchestrator.handle(b"out/B9 Prime").await;
            orchestrator.handle_with_id(rejected, b"out/B1 Prime").await;
            orchestrator.handle_with_id(ignored, b"out/B1,FTP").await;
        });

        assert_eq!(
            wait_for_finish(&mut stream, rejected).await,
            Some(JobOutcome::Rejected)
        );
        assert_eq!(
            wait_for_finish(&mut stream, ignored).await,
            Some(JobOutcome::Ignored)
        );
        worker.await?;
        assert_eq!(
            harness.orchestrator.events().finished_outcome(rejected),
            Some(JobOutcome::Rejected)
        );
        assert_eq!(harness.outcomes().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected_and_reported() -> TestResult<()> {
        let harness = Harness::new(CleanupOrder::AfterUpload)?;

        harness.orchestrator.handle(b"out/B1 Prime").await;
        harness.orchestrator.handle(b"../escape,Prime").await;

        assert_eq!(
            harness.outcomes(),
            vec![JobOutcome::Rejected, JobOutcome::Rejected]
        );
        assert_eq!(harness.notes.with_severity(Severity::Error).len(), 2);
        assert_eq!(
            harness.orchestrator.metrics().job_count(UNPARSED_ZONE, "rejected"),
            2
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn distinct_directories_complete_independently() -> TestResult<()> {
        let harness = Harness::new(CleanupOrder::AfterUpload)?;
        let names = ["B1", "B2", "B3", "B4"];
        for name in names {
            let _ = harness.batch(&format!("out/{name}"), &[("doc.txt", name.as_bytes())])?;
        }

        let mut tasks = tokio::task::JoinSet::new();
        for name in names {
            let orchestrator = Arc::clone(&harness.orchestrator);
            tasks.spawn(async move {
                orchestrator.handle(format!("out/{name},rrd").as_bytes()).await;
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined?;
        }

        let mut remotes = harness.archives.remotes();
        remotes.sort();
        assert_eq!(remotes, vec!["B1.zip", "B2.zip", "B3.zip", "B4.zip"]);
        for upload in harness.archives.uploads() {
            let local = fs::read(harness.sandbox.data_root.join("out").join(&upload.remote))?;
            assert_eq!(upload.contents, local);
        }
        assert!(
            harness
                .outcomes()
                .iter()
                .all(|outcome| *outcome == JobOutcome::Completed)
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn duplicate_deliveries_for_one_directory_serialize() -> TestResult<()> {
        let harness = Harness::new(CleanupOrder::AfterUpload)?;
        let _ = harness.batch("out/B5", &[("doc.txt", b"once")])?;

        let first = Arc::clone(&harness.orchestrator);
        let second = Arc::clone(&harness.orchestrator);
        let (left, right) = tokio::join!(
            tokio::spawn(async move { first.handle(b"out/B5,rrd").await }),
            tokio::spawn(async move { second.handle(b"out/B5,rrd").await }),
        );
        left?;
        right?;

        let mut outcomes = harness.outcomes();
        outcomes.sort_by_key(|outcome| outcome.as_str());
        assert_eq!(outcomes, vec![JobOutcome::Completed, JobOutcome::Failed]);
        assert_eq!(harness.archives.remotes(), vec!["B5.zip"]);
        Ok(())
    }
}
