//! HTTP serving layer.
//!
//! # Data Flow
//! ```text
//! DrainingListener::accept
//!     → server.rs (hyper-util connection per accepted stream)
//!     → in-flight middleware (InFlightCounter guard per request)
//!     → handlers (/, /readyz, /status, /sleep/{ms})
//!
//! On listener close:
//!     closing token fires → connections finish current request → close
//! ```

pub mod server;

pub use server::HttpServer;
