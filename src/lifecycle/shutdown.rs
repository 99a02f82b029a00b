//! Shutdown coordination for the service.
//!
//! # Sequence
//! ```text
//! Idle
//!   → RevokingReadiness    (stop advertising ready)
//!   → PreShutdownDelay     (let routing notice the readiness change)
//!   → ShuttingDownModules  (all modules concurrently, bounded by module timeout)
//!   → ShuttingDownServer   (server handle, bounded by server timeout)
//!   → Done
//! ```
//!
//! Module failures and the module phase timeout are logged and recovered.
//! The server phase always runs and its outcome is what `shutdown()` returns,
//! unless [`ErrorPolicy::ModulesAndServer`] is selected.
//!
//! Work that overruns a phase deadline is abandoned, not killed: its task is
//! detached and may keep holding resources. The deadline's cancellation token
//! is cancelled on expiry so cooperative modules can stop early.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{Phase, ShutdownError};
use crate::lifecycle::module::{ReadinessRevoker, ShutdownLogger, ShutdownModule};
use crate::lifecycle::timeouts::TimeoutPolicy;
use crate::lifecycle::wait::{bounded_wait, Deadline};
use crate::observability::metrics;

/// Stage of the shutdown sequence. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownState {
    Idle,
    RevokingReadiness,
    PreShutdownDelay,
    ShuttingDownModules,
    ShuttingDownServer,
    Done,
}

/// Which phase outcomes surface from [`ShutdownCoordinator::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Only the server phase decides the result; module failures are logged.
    #[default]
    ServerOnly,
    /// A failed or timed-out module phase is returned when the server phase
    /// itself succeeded.
    ModulesAndServer,
}

impl ErrorPolicy {
    fn resolve(
        self,
        modules: Result<(), ShutdownError>,
        server: Result<(), ShutdownError>,
    ) -> Result<(), ShutdownError> {
        match self {
            ErrorPolicy::ServerOnly => server,
            ErrorPolicy::ModulesAndServer => server.and(modules),
        }
    }
}

type NamedModule = (String, Arc<dyn ShutdownModule>);

/// Orchestrates the phased shutdown of a service. Single use.
pub struct ShutdownCoordinator {
    policy: TimeoutPolicy,
    error_policy: ErrorPolicy,
    readiness: Option<Arc<dyn ReadinessRevoker>>,
    logger: Option<Arc<dyn ShutdownLogger>>,
    modules: Vec<NamedModule>,
    server: Arc<dyn ShutdownModule>,
    state: watch::Sender<ShutdownState>,
    invoked: AtomicBool,
}

impl ShutdownCoordinator {
    /// Create a coordinator for `server`, which is shut down last.
    pub fn new(policy: TimeoutPolicy, server: Arc<dyn ShutdownModule>) -> Self {
        let (state, _) = watch::channel(ShutdownState::Idle);
        Self {
            policy,
            error_policy: ErrorPolicy::default(),
            readiness: None,
            logger: None,
            modules: Vec::new(),
            server,
            state,
            invoked: AtomicBool::new(false),
        }
    }

    /// Register a module. `name` is used for log attribution only.
    pub fn with_module(mut self, name: impl Into<String>, module: Arc<dyn ShutdownModule>) -> Self {
        self.modules.push((name.into(), module));
        self
    }

    pub fn with_readiness(mut self, readiness: Arc<dyn ReadinessRevoker>) -> Self {
        self.readiness = Some(readiness);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ShutdownLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Current stage.
    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Observe stage transitions.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// Run the full shutdown sequence.
    ///
    /// Always reaches [`ShutdownState::Done`]. A second call returns
    /// [`ShutdownError::AlreadyInvoked`] without doing anything.
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        if self.invoked.swap(true, Ordering::SeqCst) {
            return Err(ShutdownError::AlreadyInvoked);
        }
        let started = Instant::now();

        self.enter(ShutdownState::RevokingReadiness);
        if let Some(readiness) = &self.readiness {
            readiness.revoke();
        }

        self.enter(ShutdownState::PreShutdownDelay);
        self.wait_before_shutdown().await;

        self.enter(ShutdownState::ShuttingDownModules);
        let modules = self.shutdown_modules().await;

        self.enter(ShutdownState::ShuttingDownServer);
        let server = self.shutdown_server().await;

        self.enter(ShutdownState::Done);
        let result = self.error_policy.resolve(modules, server);
        metrics::record_shutdown(&result, started);

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            success = result.is_ok(),
            "Shutdown sequence finished"
        );
        result
    }

    pub(crate) fn info(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.info(message);
        }
    }

    fn error(&self, err: &ShutdownError) {
        if let Some(logger) = &self.logger {
            logger.error(err);
        }
    }

    fn enter(&self, next: ShutdownState) {
        tracing::debug!(state = ?next, "Shutdown state transition");
        self.state.send_replace(next);
    }

    async fn wait_before_shutdown(&self) {
        let delay = self.policy.pre_shutdown_delay();
        self.info(&format!("waiting before start shutdown graceful: {delay:?}"));
        tokio::time::sleep(delay).await;
    }

    async fn shutdown_modules(&self) -> Result<(), ShutdownError> {
        let timeout = self.policy.module_timeout();
        self.info(&format!("timeout for shutdown modules = {timeout:?}"));

        let started = Instant::now();
        let deadline = Deadline::after(timeout);
        let pending = Arc::new(AtomicU64::new(self.modules.len() as u64));
        let failed = Arc::new(Mutex::new(Vec::new()));

        // Every module task is spawned before any of them is awaited.
        let mut names = Vec::with_capacity(self.modules.len());
        let mut handles = Vec::with_capacity(self.modules.len());
        for (name, module) in &self.modules {
            names.push(name.clone());
            handles.push(tokio::spawn(run_module(
                name.clone(),
                Arc::clone(module),
                deadline.clone(),
                self.logger.clone(),
                PendingGuard(Arc::clone(&pending)),
                Arc::clone(&failed),
            )));
        }

        let logger = self.logger.clone();
        let barrier_failed = Arc::clone(&failed);
        let barrier = async move {
            for (name, joined) in names.into_iter().zip(join_all(handles).await) {
                if let Err(source) = joined {
                    let err = ShutdownError::ModuleShutdownFailed {
                        module: name.clone(),
                        source: Box::new(source),
                    };
                    report_module_failure(logger.as_deref(), &name, &err);
                    lock(&barrier_failed).push(name);
                }
            }

            let modules = std::mem::take(&mut *lock(&barrier_failed));
            if modules.is_empty() {
                Ok(())
            } else {
                Err(ShutdownError::ModulesFailed { modules })
            }
        };

        let result = bounded_wait(
            Phase::Modules,
            &deadline,
            || pending.load(Ordering::SeqCst),
            barrier,
        )
        .await;

        if let Err(err) = &result {
            if err.is_timeout() {
                self.error(err);
            }
        }
        metrics::record_phase(Phase::Modules, &result, started);
        result
    }

    async fn shutdown_server(&self) -> Result<(), ShutdownError> {
        let timeout = self.policy.server_timeout();
        self.info(&format!("timeout for shutdown server = {timeout:?}"));

        let started = Instant::now();
        let deadline = Deadline::after(timeout);
        let server = Arc::clone(&self.server);
        let server_deadline = deadline.clone();
        let op = async move {
            server
                .shutdown(server_deadline)
                .await
                .map_err(|source| ShutdownError::ServerShutdownFailed { source })
        };

        let result = bounded_wait(Phase::Server, &deadline, || 1, op).await;
        if let Err(err) = &result {
            self.error(err);
        }
        metrics::record_phase(Phase::Server, &result, started);
        result
    }
}

/// Decrements the pending-module count when a module task ends, panics included.
struct PendingGuard(Arc<AtomicU64>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn run_module(
    name: String,
    module: Arc<dyn ShutdownModule>,
    deadline: Deadline,
    logger: Option<Arc<dyn ShutdownLogger>>,
    _pending: PendingGuard,
    failed: Arc<Mutex<Vec<String>>>,
) {
    tracing::debug!(module = %name, "Shutting down module");

    match module.shutdown(deadline).await {
        Ok(()) => tracing::debug!(module = %name, "Module shut down"),
        Err(source) => {
            let err = ShutdownError::ModuleShutdownFailed {
                module: name.clone(),
                source,
            };
            report_module_failure(logger.as_deref(), &name, &err);
            lock(&failed).push(name);
        }
    }
}

fn report_module_failure(logger: Option<&dyn ShutdownLogger>, name: &str, err: &ShutdownError) {
    metrics::record_module_failure(name);
    if let Some(logger) = logger {
        logger.error(err);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
