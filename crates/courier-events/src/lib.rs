#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Inbound transfer events, the in-process event bus, and operator notifications.

pub mod error;
pub mod inbound;
pub mod notify;
pub mod payloads;
pub mod routing;

pub use error::{EventError, EventResult, NotifyError};
pub use inbound::{LandingZone, ResolvedJob, TransferEvent};
pub use notify::{Notification, NotificationSink, Severity};
pub use payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId, JobOutcome};
pub use routing::{EventBus, EventStream, wait_for_finish};
