//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Coordinator, listener, counters produce:
//!     → logging.rs (tracing events, ShutdownLogger bridge)
//!     → metrics.rs (phase durations, failures, connection counts)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (phase, module, outstanding)
//! - Metrics are recorded through the `metrics` facade; they are no-ops until
//!   `init_metrics` installs a recorder

pub mod logging;
pub mod metrics;
