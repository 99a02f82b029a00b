//! Graceful shutdown orchestration for long-running services.
//!
//! Stop new work, give subsystems a bounded window to drain, then tear down
//! the serving layer, without letting a hung subsystem block the process.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use error::{BoxError, Phase, ShutdownError};
pub use lifecycle::{
    Deadline, InFlightCounter, ShutdownComplete, ShutdownCoordinator, ShutdownModule, SignalWatcher,
    TimeoutPolicy,
};
pub use net::DrainingListener;
