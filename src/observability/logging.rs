//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from configuration
//! - Bridge coordinator messages into tracing events
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - JSON output is opt-in for production log shipping

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::error::ShutdownError;
use crate::lifecycle::module::ShutdownLogger;

/// Install the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("graceful_drain={0},{0}", config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// [`ShutdownLogger`] that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ShutdownLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "graceful_drain::shutdown", "{}", message);
    }

    fn error(&self, err: &ShutdownError) {
        match err {
            ShutdownError::ModuleShutdownFailed { module, source } => {
                tracing::error!(target: "graceful_drain::shutdown", module = %module, error = %source, "Module shutdown failed");
            }
            ShutdownError::TimedOut { phase, timeout, outstanding } => {
                tracing::error!(
                    target: "graceful_drain::shutdown",
                    phase = %phase,
                    timeout_ms = timeout.as_millis() as u64,
                    outstanding = *outstanding,
                    "Shutdown phase timed out"
                );
            }
            other => {
                tracing::error!(target: "graceful_drain::shutdown", error = %other, "Shutdown failed");
            }
        }
    }
}
