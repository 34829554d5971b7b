//! Domain event payloads published while jobs are processed.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifier assigned to each event emitted by the service.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Terminal state of one handled inbound event.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// Every step succeeded.
    Completed,
    /// The job ran to the end but some files failed.
    Degraded,
    /// A job-level step failed.
    Failed,
    /// The payload was malformed.
    Rejected,
    /// The landing zone was not recognised; nothing was done.
    Ignored,
}

impl JobOutcome {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
            Self::Ignored => "ignored",
        }
    }
}

/// Typed domain events surfaced by the orchestrator.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A payload resolved to a job and processing began.
    JobStarted {
        /// Identifier assigned on receipt.
        job_id: Uuid,
        /// Landing zone label.
        zone: String,
        /// Absolute source directory.
        source: String,
    },
    /// A file (or archive) reached its remote destination.
    FileTransferred {
        /// Owning job.
        job_id: Uuid,
        /// Local file name.
        file: String,
        /// Remote location reported by the gateway.
        remote: String,
        /// Bytes written remotely.
        bytes: u64,
    },
    /// A single file could not be classified, transferred or removed.
    FileFailed {
        /// Owning job.
        job_id: Uuid,
        /// Local file name.
        file: String,
        /// Human-readable failure detail.
        message: String,
    },
    /// Processing of one inbound payload finished.
    JobFinished {
        /// Identifier assigned on receipt.
        job_id: Uuid,
        /// Terminal state.
        outcome: JobOutcome,
        /// Optional failure detail.
        detail: Option<String>,
    },
}

impl Event {
    /// Machine-friendly discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::JobStarted { .. } => "job_started",
            Self::FileTransferred { .. } => "file_transferred",
            Self::FileFailed { .. } => "file_failed",
            Self::JobFinished { .. } => "job_finished",
        }
    }

    /// Job the event belongs to.
    #[must_use]
    pub const fn job_id(&self) -> Uuid {
        match self {
            Self::JobStarted { job_id, .. }
            | Self::FileTransferred { job_id, .. }
            | Self::FileFailed { job_id, .. }
            | Self::JobFinished { job_id, .. } => *job_id,
        }
    }
}

/// Metadata wrapper around events.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}
