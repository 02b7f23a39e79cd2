use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use logicprobe_app::serve::serve_connection;
use logicprobe_engine::PatternSource;
use logicprobe_foundation::AcquisitionConfig;
use logicprobe_telemetry::ProbeMetrics;

#[derive(Parser, Debug)]
#[command(name = "logicprobe", version, about = "sigrok-compatible logic analyzer probe")]
struct Cli {
    /// Address to listen on for host connections
    #[arg(long, default_value = "127.0.0.1:5555", env = "LOGICPROBE_LISTEN")]
    listen: SocketAddr,

    /// Log filter, e.g. `info` or `logicprobe_engine=debug`
    #[arg(long, default_value = "info", env = "LOGICPROBE_LOG")]
    log: String,

    /// Print the default acquisition configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn init_logging(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    if cli.dump_config {
        println!(
            "{}",
            serde_json::to_string_pretty(&AcquisitionConfig::default())?
        );
        return Ok(());
    }

    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    tracing::info!(listen = %cli.listen, "logicprobe listening");

    let metrics = Arc::new(ProbeMetrics::new());
    let mut stats_interval = tokio::time::interval(Duration::from_secs(30));
    stats_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // One host at a time; further connection attempts queue in the
    // listener backlog until the current host disconnects.
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted.context("accept failed")?;
                tracing::info!(%peer, "host connected");
                let result = serve_connection(
                    stream,
                    Box::new(PatternSource::new()),
                    Arc::clone(&metrics),
                )
                .await;
                match result {
                    Ok(()) => tracing::info!(%peer, "host disconnected"),
                    Err(e) => tracing::error!(%peer, error = %e, "connection failed"),
                }
            }
            _ = stats_interval.tick() => {
                tracing::info!(
                    runs_started = metrics.runs_started.load(Ordering::Relaxed),
                    runs_completed = metrics.runs_completed.load(Ordering::Relaxed),
                    overruns = metrics.overruns.load(Ordering::Relaxed),
                    slices_sent = metrics.slices_sent.load(Ordering::Relaxed),
                    bytes_sent = metrics.bytes_sent.load(Ordering::Relaxed),
                    "pipeline stats"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
