//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT or injected trigger → SignalWatcher → coordinator, once
//!
//! Shutdown (shutdown.rs):
//!     Revoke readiness (readiness.rs)
//!     → pre-shutdown delay (timeouts.rs)
//!     → modules concurrently, bounded (module.rs, wait.rs)
//!     → server, bounded (wait.rs)
//!     → ShutdownComplete published
//!
//! In-flight work (inflight.rs):
//!     request handlers track units → registered as a module → drained to zero
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: readiness, delay, modules, server
//! - Every phase has a timeout; overrunning work is abandoned, not killed
//! - Module failures never block siblings or the server phase

pub mod inflight;
pub mod module;
pub mod readiness;
pub mod shutdown;
pub mod signals;
pub mod timeouts;
pub mod wait;

pub use inflight::{InFlightCounter, InFlightGuard};
pub use module::{module_fn, FnModule, ReadinessRevoker, ShutdownLogger, ShutdownModule};
pub use readiness::ReadinessFlag;
pub use shutdown::{ErrorPolicy, ShutdownCoordinator, ShutdownState};
pub use signals::{termination_channel, OsSignals, ShutdownComplete, SignalWatcher, Termination, TerminationSignal};
pub use timeouts::TimeoutPolicy;
pub use wait::{bounded_wait, Deadline};
