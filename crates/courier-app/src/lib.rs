#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Courier service wiring.
//!
//! Layout: `bootstrap.rs` (CLI and service wiring), `orchestrator.rs` (per-event job routing),
//! `notify.rs` (notification sinks), `source.rs` (inbound payload lines).

/// Command-line parsing and the service boot sequence.
pub mod bootstrap;
/// Application error type.
pub mod error;
mod locks;
/// Notification sinks and fan-out.
pub mod notify;
/// Transfer job orchestration.
pub mod orchestrator;
/// Inbound payload source.
pub mod source;

pub use bootstrap::{Cli, run_app};
pub use error::{AppError, AppResult};
pub use notify::{Notifier, TracingNotifier, WebhookNotifier};
pub use orchestrator::{OrchestratorDeps, TransferOrchestrator};
pub use source::PayloadSource;
