//! Prometheus-backed metrics registry.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges the transfer service reports.

use std::sync::Arc;

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::error::{TelemetryError, TelemetryResult};

/// Prometheus-backed metrics registry shared across the service.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    jobs_total: IntCounterVec,
    files_total: IntCounterVec,
    bytes_uploaded_total: IntCounterVec,
    active_jobs: IntGauge,
}

impl Metrics {
    /// Construct a registry with the standard collectors.
    ///
    /// # Errors
    ///
    /// Returns an error if any collector cannot be built or registered.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let jobs_total = counter_vec(
            "courier_jobs_total",
            "Inbound events handled by landing zone and outcome",
            &["zone", "outcome"],
        )?;
        let files_total = counter_vec(
            "courier_files_total",
            "Files processed by group and status",
            &["group", "status"],
        )?;
        let bytes_uploaded_total = counter_vec(
            "courier_bytes_uploaded_total",
            "Bytes written to remote destinations by gateway",
            &["gateway"],
        )?;
        let active_jobs = IntGauge::with_opts(Opts::new("courier_active_jobs", "Jobs in flight"))
            .map_err(|source| TelemetryError::MetricsCollector {
                name: "courier_active_jobs",
                source,
            })?;

        register(&registry, "courier_jobs_total", Box::new(jobs_total.clone()))?;
        register(&registry, "courier_files_total", Box::new(files_total.clone()))?;
        register(
            &registry,
            "courier_bytes_uploaded_total",
            Box::new(bytes_uploaded_total.clone()),
        )?;
        register(&registry, "courier_active_jobs", Box::new(active_jobs.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                jobs_total,
                files_total,
                bytes_uploaded_total,
                active_jobs,
            }),
        })
    }

    /// Count a finished job.
    pub fn inc_job(&self, zone: &str, outcome: &str) {
        self.inner
            .jobs_total
            .with_label_values(&[zone, outcome])
            .inc();
    }

    /// Count a processed file.
    pub fn inc_file(&self, group: &str, status: &str) {
        self.inner
            .files_total
            .with_label_values(&[group, status])
            .inc();
    }

    /// Add uploaded bytes for a gateway.
    pub fn add_uploaded_bytes(&self, gateway: &str, bytes: u64) {
        self.inner
            .bytes_uploaded_total
            .with_label_values(&[gateway])
            .inc_by(bytes);
    }

    /// Mark a job as started.
    pub fn job_started(&self) {
        self.inner.active_jobs.inc();
    }

    /// Mark a job as finished.
    pub fn job_finished(&self) {
        self.inner.active_jobs.dec();
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the buffer is not valid UTF-8.
    pub fn render(&self) -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Jobs currently in flight.
    #[must_use]
    pub fn active_jobs(&self) -> i64 {
        self.inner.active_jobs.get()
    }

    /// Finished jobs recorded for a zone and outcome.
    #[must_use]
    pub fn job_count(&self, zone: &str, outcome: &str) -> u64 {
        self.inner
            .jobs_total
            .with_label_values(&[zone, outcome])
            .get()
    }

    /// Files recorded for a group and status.
    #[must_use]
    pub fn file_count(&self, group: &str, status: &str) -> u64 {
        self.inner
            .files_total
            .with_label_values(&[group, status])
            .get()
    }
}

fn counter_vec(
    name: &'static str,
    help: &str,
    labels: &[&str],
) -> TelemetryResult<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register(
    registry: &Registry,
    name: &'static str,
    collector: Box<dyn prometheus::core::Collector>,
) -> TelemetryResult<()> {
    registry
        .register(collector)
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
