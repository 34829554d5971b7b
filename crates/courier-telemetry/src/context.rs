//! Span guards for the process and for individual jobs.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the application-level tracing span for the lifetime of the guard.
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Span wrapping the processing of one inbound event.
#[must_use]
pub fn job_span(job_id: &str, zone: &str) -> Span {
    tracing::info_span!("job", job_id = %job_id, zone = %zone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_enter_and_exit() {
        let guard = GlobalContextGuard::new("test");
        let span = job_span("00000000-0000-0000-0000-000000000000", "rrd");
        let entered = span.enter();
        drop(entered);
        drop(guard);
    }
}
