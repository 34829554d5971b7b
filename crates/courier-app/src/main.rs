#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Binary entrypoint that reads transfer events and routes each batch to its destination.

use courier_app::{AppResult, run_app};

/// Bootstraps the courier service and blocks until the payload source is exhausted.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
