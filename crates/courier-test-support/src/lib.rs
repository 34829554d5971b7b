#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared test helpers used across the workspace.
//! Layout: fixtures.rs (temp trees and sample configuration), mocks.rs (fake gateways and notifiers).

pub mod fixtures;
pub mod mocks;
