//! Shutdown timeout policy.
//!
//! A zero duration in any field means "use the built-in default" for that
//! field, so a partially filled policy is always usable.

use std::time::Duration;

/// Default pause between readiness revocation and module shutdown.
pub const DEFAULT_PRE_SHUTDOWN_DELAY: Duration = Duration::from_secs(3);

/// Default bound for the module phase and the server phase.
pub const DEFAULT_PHASE_TIMEOUT: Duration = Duration::from_secs(15);

/// Durations governing each stage of the shutdown sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pre_shutdown_delay: Duration,
    module_timeout: Duration,
    server_timeout: Duration,
}

impl TimeoutPolicy {
    /// Build a policy. Zero values fall back to the defaults on read.
    pub const fn new(pre_shutdown_delay: Duration, module_timeout: Duration, server_timeout: Duration) -> Self {
        Self {
            pre_shutdown_delay,
            module_timeout,
            server_timeout,
        }
    }

    /// Time to wait after readiness is revoked, before modules are stopped.
    pub fn pre_shutdown_delay(&self) -> Duration {
        or_default(self.pre_shutdown_delay, DEFAULT_PRE_SHUTDOWN_DELAY)
    }

    /// Bound for the concurrent module phase.
    pub fn module_timeout(&self) -> Duration {
        or_default(self.module_timeout, DEFAULT_PHASE_TIMEOUT)
    }

    /// Bound for the server phase.
    pub fn server_timeout(&self) -> Duration {
        or_default(self.server_timeout, DEFAULT_PHASE_TIMEOUT)
    }
}

fn or_default(value: Duration, default: Duration) -> Duration {
    if value.is_zero() {
        default
    } else {
        value
    }
}
