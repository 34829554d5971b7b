#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Startup configuration for the transfer service.
//!
//! Layout: `model.rs` (typed settings), `loader.rs` (sources and the startup
//! loader), `validate.rs` (parsing helpers), `defaults.rs` (keys and defaults).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigSource, load, load_from_env};
pub use model::{
    CleanupOrder, CourierConfig, HostKeyPolicy, LoggingSettings, NotificationConfig, PrimeConfig,
    RrdConfig, Secret,
};
