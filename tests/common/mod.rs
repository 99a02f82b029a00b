//! Shared stubs for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;

use graceful_drain::lifecycle::{ReadinessRevoker, ShutdownLogger, ShutdownModule, TimeoutPolicy};
use graceful_drain::{BoxError, Deadline, Phase, ShutdownError};

/// Module that optionally sleeps, then returns a fixed outcome.
pub struct StubModule {
    sleep: Duration,
    error: Option<&'static str>,
    invoked: AtomicBool,
    finished: AtomicBool,
}

impl StubModule {
    pub fn success() -> Arc<Self> {
        Self::build(Duration::ZERO, None)
    }

    pub fn failing(message: &'static str) -> Arc<Self> {
        Self::build(Duration::ZERO, Some(message))
    }

    pub fn sleeping(sleep: Duration) -> Arc<Self> {
        Self::build(sleep, None)
    }

    fn build(sleep: Duration, error: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            sleep,
            error,
            invoked: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        })
    }

    pub fn was_invoked(&self) -> bool {
        self.invoked.load(Ordering::SeqCst)
    }

    pub fn has_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShutdownModule for StubModule {
    async fn shutdown(&self, _deadline: Deadline) -> Result<(), BoxError> {
        self.invoked.store(true, Ordering::SeqCst);
        if !self.sleep.is_zero() {
            tokio::time::sleep(self.sleep).await;
        }
        self.finished.store(true, Ordering::SeqCst);
        match self.error {
            Some(message) => Err(message.into()),
            None => Ok(()),
        }
    }
}

/// What the coordinator reported through `ShutdownLogger::error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Logged {
    TimedOut { phase: Phase, outstanding: u64 },
    Module { name: String, message: String },
    Server(String),
    Other(String),
}

impl From<&ShutdownError> for Logged {
    fn from(err: &ShutdownError) -> Self {
        match err {
            ShutdownError::TimedOut { phase, outstanding, .. } => Logged::TimedOut {
                phase: *phase,
                outstanding: *outstanding,
            },
            ShutdownError::ModuleShutdownFailed { module, source } => Logged::Module {
                name: module.clone(),
                message: source.to_string(),
            },
            ShutdownError::ServerShutdownFailed { source } => Logged::Server(source.to_string()),
            other => Logged::Other(other.to_string()),
        }
    }
}

/// Logger that records everything it is given.
#[derive(Default)]
pub struct RecordingLogger {
    infos: Mutex<Vec<String>>,
    errors: Mutex<Vec<Logged>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<Logged> {
        self.errors.lock().unwrap().clone()
    }
}

impl ShutdownLogger for RecordingLogger {
    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn error(&self, err: &ShutdownError) {
        self.errors.lock().unwrap().push(Logged::from(err));
    }
}

/// Readiness revoker that records the call.
#[derive(Default)]
pub struct RecordingReadiness {
    revoked: AtomicBool,
}

impl RecordingReadiness {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn was_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }
}

impl ReadinessRevoker for RecordingReadiness {
    fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }
}

/// Short delay, one-second phases.
pub fn test_policy() -> TimeoutPolicy {
    TimeoutPolicy::new(
        Duration::from_millis(1),
        Duration::from_secs(1),
        Duration::from_secs(1),
    )
}

/// Sleeps well past a `test_policy` phase timeout.
pub fn hanging() -> Arc<StubModule> {
    StubModule::sleeping(Duration::from_secs(2))
}
