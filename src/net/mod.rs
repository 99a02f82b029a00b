//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming connection
//!     → listener.rs (accept, hand out tracked connections)
//!     → connection.rs (open/closed accounting, close-once guard)
//!     → Hand off to the serving layer
//!
//! On close:
//!     stop accepting → wake pending accepts → wait for open count == 0
//! ```
//!
//! # Design Decisions
//! - Any accepting source can be wrapped (TCP, Unix, in-memory for tests)
//! - Each connection tracked for graceful shutdown
//! - Counters are cumulative; the open count is derived

pub mod connection;
pub mod listener;

pub use connection::{ConnectionId, ListenerMetrics, TrackedConnection};
pub use listener::{DrainingListener, Listener, ListenerError};
