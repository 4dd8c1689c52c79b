//! `kube-hosts-sync` command line entry point.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kube_hosts_sync::config::{DEFAULT_ADDRESS, DEFAULT_HOSTS_FILE, DEFAULT_NAMESPACE};
use kube_hosts_sync::{FailurePolicy, KubeClusterApi, OutputTarget, SyncConfig, Syncer};

#[derive(Debug, Parser)]
#[command(name = "kube-hosts-sync")]
#[command(about = "Sync Kubernetes ingress hosts and service IPs into a hosts file")]
#[command(version)]
struct Cli {
    /// Regular expression selecting the hosts to publish
    #[arg(long)]
    host_pattern: String,

    /// Hosts file to read
    #[arg(long, default_value = DEFAULT_HOSTS_FILE)]
    in_hostsfile: PathBuf,

    /// Hosts file to write; pass "-" for standard output
    #[arg(long, default_value = DEFAULT_HOSTS_FILE)]
    out_hostsfile: OutputTarget,

    /// Address for ingress hosts; services use their cluster IP
    #[arg(long, default_value = DEFAULT_ADDRESS)]
    default_ip_addr: String,

    /// Namespace to read ingresses and services from
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Keep syncing until interrupted
    #[arg(long)]
    watch: bool,

    /// Seconds between passes in watch mode
    #[arg(long, default_value_t = 30)]
    poll_period_s: u64,

    /// What to do when a pass fails in watch mode: "abort" or "continue"
    #[arg(long, default_value = "abort")]
    on_error: FailurePolicy,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> SyncConfig {
        let mut config = SyncConfig::new(self.host_pattern)
            .with_input(self.in_hostsfile)
            .with_output(self.out_hostsfile)
            .with_default_address(self.default_ip_addr)
            .with_namespace(self.namespace)
            .with_failure_policy(self.on_error);
        if self.watch {
            config = config.with_watch(Duration::from_secs(self.poll_period_s));
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(&cli.log_level);

    // kube's rustls client needs a process-wide crypto provider.
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();

    let api = KubeClusterApi::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let syncer = Syncer::new(cli.into_config(), api).context("Invalid configuration")?;

    let config = syncer.config();
    info!(
        pattern = %config.host_pattern,
        namespace = %config.namespace,
        input = %config.input.display(),
        output = %config.output,
        watch = config.watch,
        "kube-hosts-sync starting"
    );

    let shutdown = shutdown_signal().context("Failed to set up signal handlers")?;
    syncer.run(shutdown).await.context("Sync failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Logs to stderr so standard output stays free for `--out-hostsfile -`.
fn init_logger(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves on the first SIGTERM, SIGINT or SIGHUP.
///
/// Handlers are registered before returning so a signal that arrives while a
/// pass is running is not lost.
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate()).context("SIGTERM")?;
    let mut sigint = signal(SignalKind::interrupt()).context("SIGINT")?;
    let mut sighup = signal(SignalKind::hangup()).context("SIGHUP")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
            _ = sighup.recv() => info!("Received SIGHUP, shutting down"),
        }
    })
}
