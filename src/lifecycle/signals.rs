//! Termination signal handling.
//!
//! # Responsibilities
//! - Wait for one termination request (SIGTERM/SIGINT, or an injected source)
//! - Run the shutdown coordinator exactly once in response
//! - Publish a completion signal that process bootstrap awaits before exiting
//!
//! # Design Decisions
//! - The termination source is injected, so tests never touch process signals
//! - A dropped in-process trigger counts as a termination request

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

use crate::lifecycle::shutdown::ShutdownCoordinator;

/// Why termination was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Requested from inside the process.
    Requested,
    /// The in-process trigger was dropped without firing.
    TriggerDropped,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Termination::Interrupt => "SIGINT",
            Termination::Terminate => "SIGTERM",
            Termination::Requested => "requested",
            Termination::TriggerDropped => "trigger dropped",
        })
    }
}

/// A one-shot notification that the process should terminate.
pub trait TerminationSignal: Send + 'static {
    fn recv(self) -> impl Future<Output = Termination> + Send;
}

/// Process signals: Ctrl+C everywhere, plus SIGTERM on Unix.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSignals;

impl TerminationSignal for OsSignals {
    fn recv(self) -> impl Future<Output = Termination> + Send {
        async {
            let ctrl_c = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %err, "Failed to listen for Ctrl+C");
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "Failed to install SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => Termination::Interrupt,
                _ = terminate => Termination::Terminate,
            }
        }
    }
}

impl TerminationSignal for oneshot::Receiver<Termination> {
    fn recv(self) -> impl Future<Output = Termination> + Send {
        async move { self.await.unwrap_or(Termination::TriggerDropped) }
    }
}

/// In-process termination trigger paired with a `oneshot::Receiver`.
pub fn termination_channel() -> (oneshot::Sender<Termination>, oneshot::Receiver<Termination>) {
    oneshot::channel()
}

/// Completion signal published once shutdown has finished.
#[derive(Debug, Clone)]
pub struct ShutdownComplete {
    rx: watch::Receiver<bool>,
}

impl ShutdownComplete {
    pub fn is_complete(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the shutdown sequence has finished.
    ///
    /// Also returns if the watcher task died without finishing.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|done| *done).await;
    }
}

/// Bridges one termination notification to one coordinator run.
pub struct SignalWatcher {
    coordinator: Arc<ShutdownCoordinator>,
}

impl SignalWatcher {
    pub fn new(coordinator: Arc<ShutdownCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Start watching `signal` in the background.
    ///
    /// Consumes the watcher: one watcher triggers at most one shutdown.
    pub fn watch<S: TerminationSignal>(self, signal: S) -> ShutdownComplete {
        let (done_tx, done_rx) = watch::channel(false);
        let coordinator = self.coordinator;

        tokio::spawn(async move {
            let termination = signal.recv().await;
            tracing::info!(signal = %termination, "Shutdown signal received");
            coordinator.info(&format!("signal type: {termination}"));

            if let Err(err) = coordinator.shutdown().await {
                tracing::error!(signal = %termination, error = %err, "Shutdown failed");
            }

            done_tx.send_replace(true);
        });

        ShutdownComplete { rx: done_rx }
    }
}
