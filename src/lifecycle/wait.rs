//! Deadline-bounded waiting.
//!
//! # Responsibilities
//! - Carry a phase deadline plus a cancellation token into shutdown capabilities
//! - Race a spawned operation against that deadline
//!
//! # Design Decisions
//! - The operation runs on its own task; on expiry the task is detached, not aborted
//! - Expiry cancels the deadline's token so cooperative operations can stop early
//! - Operations that ignore the token keep running until they finish on their own

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Phase, ShutdownError};

/// A point in time by which a shutdown capability should be done.
///
/// Cloning shares the cancellation token: once the owning phase gives up,
/// every clone observes [`Deadline::is_cancelled`].
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    timeout: Duration,
    token: CancellationToken,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
            token: CancellationToken::new(),
        }
    }

    /// Instant at which the deadline expires.
    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Total budget this deadline was created with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time left before expiry, zero once passed.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// True once the owning phase abandoned the work.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the deadline passes or the owning phase gives up.
    pub async fn expired(&self) {
        tokio::select! {
            _ = tokio::time::sleep_until(self.at) => {}
            _ = self.token.cancelled() => {}
        }
    }

    /// Completes only when the owning phase gives up.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }
}

/// Run `op` on a separate task and wait for it until `deadline`.
///
/// Returns the operation's own result when it finishes in time. Otherwise
/// cancels the deadline token and returns [`ShutdownError::TimedOut`] carrying
/// `outstanding()` as sampled at expiry. The task is detached on expiry and may
/// keep running.
pub async fn bounded_wait<T, F, O>(
    phase: Phase,
    deadline: &Deadline,
    outstanding: O,
    op: F,
) -> Result<T, ShutdownError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, ShutdownError>> + Send + 'static,
    O: FnOnce() -> u64,
{
    let handle = tokio::spawn(op);

    match tokio::time::timeout_at(deadline.instant(), handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(source)) => Err(ShutdownError::TaskFailed { phase, source }),
        Err(_) => {
            deadline.cancel();
            let outstanding = outstanding();
            tracing::warn!(
                phase = %phase,
                timeout_ms = deadline.timeout().as_millis() as u64,
                outstanding,
                "Deadline expired, abandoning shutdown task"
            );
            Err(ShutdownError::TimedOut {
                phase,
                timeout: deadline.timeout(),
                outstanding,
            })
        }
    }
}
