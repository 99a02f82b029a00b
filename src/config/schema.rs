//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::lifecycle::inflight::DEFAULT_POLL_INTERVAL;
use crate::lifecycle::shutdown::ErrorPolicy;
use crate::lifecycle::timeouts::{TimeoutPolicy, DEFAULT_PHASE_TIMEOUT, DEFAULT_PRE_SHUTDOWN_DELAY};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Shutdown sequencing.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Shutdown timeouts and error policy.
///
/// A zero timeout falls back to the built-in default for that phase.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Pause after readiness is revoked, in milliseconds.
    pub pre_shutdown_delay_ms: u64,

    /// Bound for the concurrent module phase, in milliseconds.
    pub module_timeout_ms: u64,

    /// Bound for the server phase, in milliseconds.
    pub server_timeout_ms: u64,

    /// Interval between in-flight drain checks, in milliseconds.
    pub poll_interval_ms: u64,

    /// Which phase outcomes surface as the shutdown result.
    pub error_policy: ErrorPolicy,
}

impl ShutdownConfig {
    pub fn timeout_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy::new(
            Duration::from_millis(self.pre_shutdown_delay_ms),
            Duration::from_millis(self.module_timeout_ms),
            Duration::from_millis(self.server_timeout_ms),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            pre_shutdown_delay_ms: DEFAULT_PRE_SHUTDOWN_DELAY.as_millis() as u64,
            module_timeout_ms: DEFAULT_PHASE_TIMEOUT.as_millis() as u64,
            server_timeout_ms: DEFAULT_PHASE_TIMEOUT.as_millis() as u64,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            error_policy: ErrorPolicy::default(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
