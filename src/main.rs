//! graceful-drain service binary.
//!
//! # Wiring
//! ```text
//! config (TOML) → logging + metrics
//!     → DrainingListener (TCP) → HttpServer accept loop
//!     → ShutdownCoordinator
//!          readiness: ReadinessFlag (/readyz)
//!          modules:   "requests" → InFlightCounter
//!          server:    DrainingListener (close + drain)
//!     → SignalWatcher(SIGINT/SIGTERM) → ShutdownComplete awaited before exit
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;

use graceful_drain::config::{load_config, override_bind_address, ServiceConfig};
use graceful_drain::http::HttpServer;
use graceful_drain::lifecycle::{
    InFlightCounter, OsSignals, ReadinessFlag, ShutdownCoordinator, SignalWatcher,
};
use graceful_drain::net::DrainingListener;
use graceful_drain::observability::logging::{init_logging, TracingLogger};
use graceful_drain::observability::metrics;

#[derive(Parser)]
#[command(name = "graceful-drain")]
#[command(about = "HTTP service with phased graceful shutdown", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config = override_bind_address(config, bind)?;
    }

    init_logging(&config.observability);
    tracing::info!("graceful-drain v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(err) = metrics::init_metrics(addr) {
                    tracing::error!(error = %err, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let policy = config.shutdown.timeout_policy();
    tracing::info!(
        bind_address = %config.listener.bind_address,
        pre_shutdown_delay_ms = policy.pre_shutdown_delay().as_millis() as u64,
        module_timeout_ms = policy.module_timeout().as_millis() as u64,
        server_timeout_ms = policy.server_timeout().as_millis() as u64,
        "Configuration loaded"
    );

    let listener = Arc::new(DrainingListener::bind(&config.listener).await?);
    let readiness = ReadinessFlag::new();
    let inflight = InFlightCounter::new().with_poll_interval(config.shutdown.poll_interval());

    let coordinator = ShutdownCoordinator::new(policy, listener.clone())
        .with_readiness(Arc::new(readiness.clone()))
        .with_module("requests", Arc::new(inflight.clone()))
        .with_logger(Arc::new(TracingLogger))
        .with_error_policy(config.shutdown.error_policy);

    let mut complete = SignalWatcher::new(Arc::new(coordinator)).watch(OsSignals);

    HttpServer::new(listener, readiness, inflight).run().await;
    complete.wait().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
