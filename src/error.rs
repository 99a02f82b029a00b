//! Error taxonomy for the shutdown engine.
//!
//! # Propagation
//! ```text
//! Module failure / module phase timeout
//!     → reported through the ShutdownLogger, recovered locally
//! Server failure / server phase timeout
//!     → reported through the ShutdownLogger AND returned from shutdown()
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error type returned by module and server shutdown capabilities.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A bounded stage of the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Concurrent shutdown of all registered modules.
    Modules,
    /// Shutdown of the server handle.
    Server,
    /// Waiting for in-flight work to reach zero.
    Drain,
}

impl Phase {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Modules => "modules",
            Phase::Server => "server",
            Phase::Drain => "drain",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while shutting the service down.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// A bounded wait did not finish before its deadline.
    #[error("{phase} shutdown timed out after {timeout:?} ({outstanding} outstanding)")]
    TimedOut {
        phase: Phase,
        timeout: Duration,
        /// Units of work (modules, requests) still running when the deadline hit.
        outstanding: u64,
    },

    /// A single module's shutdown capability returned an error.
    #[error("module {module}: failed graceful shutdown: {source}")]
    ModuleShutdownFailed {
        module: String,
        #[source]
        source: BoxError,
    },

    /// Aggregate of the module phase when one or more modules failed.
    #[error("{} module(s) failed graceful shutdown: {}", .modules.len(), .modules.join(", "))]
    ModulesFailed { modules: Vec<String> },

    /// The server handle's shutdown capability returned an error.
    #[error("server: failed graceful shutdown: {source}")]
    ServerShutdownFailed {
        #[source]
        source: BoxError,
    },

    /// The task driving a phase panicked or was aborted.
    #[error("{phase} shutdown task failed: {source}")]
    TaskFailed {
        phase: Phase,
        #[source]
        source: tokio::task::JoinError,
    },

    /// `shutdown()` was called more than once.
    #[error("shutdown already invoked")]
    AlreadyInvoked,
}

impl ShutdownError {
    /// True when the error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ShutdownError::TimedOut { .. })
    }

    /// Outstanding work carried by a timeout, if any.
    pub fn outstanding(&self) -> Option<u64> {
        match self {
            ShutdownError::TimedOut { outstanding, .. } => Some(*outstanding),
            _ => None,
        }
    }

    /// Module the error is attributed to, if any.
    pub fn module(&self) -> Option<&str> {
        match self {
            ShutdownError::ModuleShutdownFailed { module, .. } => Some(module),
            _ => None,
        }
    }
}
