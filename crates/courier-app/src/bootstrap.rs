use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use courier_config::{CourierConfig, HostKeyPolicy, load_from_env};
use courier_events::EventBus;
use courier_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::orchestrator::{OrchestratorDeps, TransferOrchestrator};
use crate::source::PayloadSource;

const BUILD_SHA: &str = match option_env!("COURIER_BUILD_SHA") {
    Some(sha) => sha,
    None => env!("CARGO_PKG_VERSION"),
};

/// Command-line surface of the `courier` binary.
#[derive(Debug, Parser)]
#[command(
    name = "courier",
    about = "Routes completed document batches to the Prime share or the RRD SFTP host"
)]
pub struct Cli {
    /// YAML file with configuration values; environment variables take precedence.
    #[arg(long, env = "COURIER_CONFIG")]
    pub config: Option<PathBuf>,
    /// File of newline-delimited transfer events; stdin when omitted.
    #[arg(long)]
    pub payloads: Option<PathBuf>,
    /// Log level or filter directive overriding the configured level.
    #[arg(long)]
    pub log_level: Option<String>,
    /// Log output format overriding the configured one.
    #[arg(long, value_parser = ["json", "pretty", "text"])]
    pub log_format: Option<String>,
}

/// Dependencies required to run the service.
pub(crate) struct BootstrapDependencies {
    config: CourierConfig,
    payloads: Option<PathBuf>,
    log_level: String,
    log_format: LogFormat,
    events: EventBus,
    metrics: Metrics,
}

impl BootstrapDependencies {
    /// Validate configuration for the binary entrypoint; absence of a required value is fatal here.
    pub(crate) fn from_cli(cli: Cli) -> AppResult<Self> {
        let config = load_from_env(cli.config.as_deref())
            .map_err(|err| AppError::config("config.load", err))?;
        let log_level = cli
            .log_level
            .unwrap_or_else(|| config.logging.level.clone());
        let log_format =
            LogFormat::from_setting(cli.log_format.as_deref().or(config.logging.format.as_deref()))
                .map_err(|err| AppError::telemetry("telemetry.log_format", err))?;
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

        Ok(Self {
            config,
            payloads: cli.payloads,
            log_level,
            log_format,
            events: EventBus::new(),
            metrics,
        })
    }
}

/// Entry point for the courier boot sequence.
///
/// # Errors
///
/// Returns an error if configuration is invalid, logging cannot be installed, or the
/// payload source cannot be read.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_cli(Cli::parse())?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies {
        config,
        payloads,
        log_level,
        log_format,
        events,
        metrics,
    } = dependencies;

    courier_telemetry::init_logging(&LoggingConfig {
        level: &log_level,
        format: log_format,
        build_sha: BUILD_SHA,
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("service");

    info!(
        data_root = %config.data_root.display(),
        manifest_share = %config.prime.manifest_root.display(),
        payload_share = %config.prime.payload_root.display(),
        rrd_host = %config.rrd.host,
        rrd_port = config.rrd.port,
        host_keys = %config.rrd.host_key_policy.describe(),
        cleanup_order = config.rrd.cleanup_order.as_str(),
        "courier bootstrap starting"
    );
    if config.rrd.host_key_policy == HostKeyPolicy::Disabled {
        warn!(host = %config.rrd.host, "sftp host key verification is disabled; any key is accepted");
    }

    let deps = OrchestratorDeps::from_config(&config, events, metrics.clone())?;
    let orchestrator = Arc::new(TransferOrchestrator::new(config, deps));
    let mut source = PayloadSource::open(payloads.as_deref()).await?;

    let handled = dispatch(&orchestrator, &mut source).await;

    match metrics.render() {
        Ok(rendered) => info!(metrics = %rendered, "final metrics"),
        Err(err) => warn!(error = %err, "failed to render metrics"),
    }
    let received = handled?;
    info!(received, "courier shutdown complete");
    Ok(())
}

/// Spawn one task per payload and wait for all of them; returns the number received.
async fn dispatch(
    orchestrator: &Arc<TransferOrchestrator>,
    source: &mut PayloadSource,
) -> AppResult<usize> {
    let mut tasks = JoinSet::new();
    let mut received = 0_usize;
    let read = loop {
        match source.next_payload().await {
            Ok(Some(payload)) => {
                received += 1;
                let orchestrator = Arc::clone(orchestrator);
                tasks.spawn(async move { orchestrator.handle(&payload).await });
            }
            Ok(None) => break Ok(received),
            Err(err) => break Err(err),
        }
    };

    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            error!(error = %err, "transfer task aborted");
        }
    }
    read
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_config::CleanupOrder;
    use courier_events::{Event, JobOutcome};
    use courier_test_support::fixtures::{Sandbox, batch_dir};
    use courier_test_support::mocks::{MemoryGateway, RecordingNotifier};

    use crate::notify::Notifier;

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from([
            "courier",
            "--config",
            "/etc/courier.yaml",
            "--payloads",
            "/var/spool/courier/events",
            "--log-format",
            "json",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/courier.yaml")));
        assert_eq!(
            cli.payloads,
            Some(PathBuf::from("/var/spool/courier/events"))
        );
        assert_eq!(cli.log_format.as_deref(), Some("json"));
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn cli_rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["courier", "--log-format", "xml"]).is_err());
    }

    #[tokio::test]
    async fn dispatch_handles_every_line() -> anyhow::Result<()> {
        let sandbox = Sandbox::new()?;
        let _ = batch_dir(&sandbox.data_root, "out/B1", &[("a.txt", b"a")])?;
        let _ = batch_dir(&sandbox.data_root, "out/B2", &[("b.txt", b"b")])?;
        let config = sandbox.config(CleanupOrder::AfterUpload);
        let archives = MemoryGateway::new("sftp");
        let deps = OrchestratorDeps {
            manifest_gateway: Arc::new(MemoryGateway::new("share")),
            payload_gateway: Arc::new(MemoryGateway::new("share")),
            archive_gateway: Arc::new(archives.clone()),
            notifier: Notifier::new(
                &config.notifications,
                vec![Arc::new(RecordingNotifier::new())],
            ),
            events: EventBus::new(),
            metrics: Metrics::new()?,
        };
        let orchestrator = Arc::new(TransferOrchestrator::new(config, deps));
        let mut source = PayloadSource::from_reader(
            Box::new(&b"out/B1,rrd\n\nout/B2,RRD\nout/B3,ftp\n"[..]),
            None,
        );

        let received = dispatch(&orchestrator, &mut source).await?;

        assert_eq!(received, 3);
        let mut remotes = archives.remotes();
        remotes.sort();
        assert_eq!(remotes, vec!["B1.zip", "B2.zip"]);
        let finished = orchestrator
            .events()
            .backlog_since(0)
            .into_iter()
            .filter_map(|envelope| match envelope.event {
                Event::JobFinished { outcome, .. } => Some(outcome),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(finished.len(), 3);
        assert!(finished.contains(&JobOutcome::Ignored));
        Ok(())
    }
}
