//! Readiness flag revoked at the start of shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::lifecycle::module::ReadinessRevoker;

/// Shared ready/not-ready flag.
///
/// Starts ready. A readiness endpoint reads it; the coordinator revokes it.
#[derive(Debug, Clone)]
pub struct ReadinessFlag {
    ready: Arc<AtomicBool>,
}

impl ReadinessFlag {
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

impl Default for ReadinessFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessRevoker for ReadinessFlag {
    fn revoke(&self) {
        if self.ready.swap(false, Ordering::AcqRel) {
            tracing::info!("Readiness revoked");
        }
    }
}
