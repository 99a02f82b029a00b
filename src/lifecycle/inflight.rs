//! In-flight work tracking.
//!
//! # Responsibilities
//! - Count outstanding units of work (requests, jobs) across tasks
//! - Let shutdown wait until the count drains to zero, bounded by a deadline
//!
//! # Design Decisions
//! - Lock-free: a single atomic counter, decrement floors at zero
//! - Waiting polls on a short fixed interval instead of per-decrement wakeups

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::time::MissedTickBehavior;

use crate::error::{BoxError, Phase, ShutdownError};
use crate::lifecycle::module::ShutdownModule;
use crate::lifecycle::wait::Deadline;

/// Default interval between drain checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Concurrency-safe counter of outstanding work.
///
/// Clones share the same count.
#[derive(Debug, Clone)]
pub struct InFlightCounter {
    count: Arc<AtomicU64>,
    poll_interval: Duration,
}

impl InFlightCounter {
    pub fn new() -> Self {
        Self {
            count: Arc::new(AtomicU64::new(0)),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the drain polling interval. Zero keeps the default.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.poll_interval = interval;
        }
        self
    }

    /// Register one unit of work.
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Finish one unit of work. No-op when the count is already zero.
    pub fn decrement(&self) {
        saturating_decrement(&self.count);
    }

    /// Register one unit of work, finished when the guard drops.
    pub fn track(&self) -> InFlightGuard {
        self.increment();
        InFlightGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.count() == 0
    }

    /// Wait until no work is outstanding or the deadline passes.
    ///
    /// On expiry returns [`ShutdownError::TimedOut`] with the count still
    /// outstanding at that moment.
    pub async fn wait_until_zero(&self, deadline: &Deadline) -> Result<(), ShutdownError> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.is_finished() {
                return Ok(());
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = deadline.expired() => {
                    let outstanding = self.count();
                    if outstanding == 0 {
                        return Ok(());
                    }
                    return Err(ShutdownError::TimedOut {
                        phase: Phase::Drain,
                        timeout: deadline.timeout(),
                        outstanding,
                    });
                }
            }
        }
    }
}

impl Default for InFlightCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShutdownModule for InFlightCounter {
    async fn shutdown(&self, deadline: Deadline) -> Result<(), BoxError> {
        tracing::info!(outstanding = self.count(), "Waiting for in-flight work to drain");
        self.wait_until_zero(&deadline).await?;
        Ok(())
    }
}

/// Unit of in-flight work. Decrements its counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    count: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        saturating_decrement(&self.count);
    }
}

fn saturating_decrement(count: &AtomicU64) {
    let _ = count.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn decrement_floors_at_zero() {
        let counter = InFlightCounter::new();
        counter.decrement();
        assert_eq!(counter.count(), 0);

        counter.increment();
        counter.decrement();
        counter.decrement();
        assert_eq!(counter.count(), 0);
        assert!(counter.is_finished());
    }

    #[test]
    fn guard_tracks_lifetime() {
        let counter = InFlightCounter::new();
        let first = counter.track();
        let second = counter.track();
        assert_eq!(counter.count(), 2);

        drop(first);
        assert_eq!(counter.count(), 1);
        drop(second);
        assert!(counter.is_finished());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_settle_at_difference() {
        let counter = InFlightCounter::new();
        let n = 200;
        let m = 150;

        // Every task increments; the first m also decrement after their own
        // increment, so the count can never dip below zero mid-run.
        let handles: Vec<_> = (0..n)
            .map(|i| {
                let counter = counter.clone();
                tokio::spawn(async move {
                    counter.increment();
                    tokio::task::yield_now().await;
                    if i < m {
                        counter.decrement();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(counter.count(), (n - m) as u64);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_returns_once_drained() {
        let counter = InFlightCounter::new();
        counter.increment();
        counter.increment();

        let worker = counter.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            worker.decrement();
            tokio::time::sleep(Duration::from_millis(300)).await;
            worker.decrement();
        });

        let started = Instant::now();
        counter
            .wait_until_zero(&Deadline::after(Duration::from_secs(2)))
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(600));
        assert!(elapsed < Duration::from_millis(600) + DEFAULT_POLL_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_with_remaining_count() {
        let counter = InFlightCounter::new().with_poll_interval(Duration::from_millis(150));
        for _ in 0..3 {
            counter.increment();
        }

        let worker = counter.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            worker.decrement();
        });

        let err = counter
            .wait_until_zero(&Deadline::after(Duration::from_millis(500)))
            .await
            .unwrap_err();

        assert!(matches!(err, ShutdownError::TimedOut { phase: Phase::Drain, outstanding: 2, .. }));
    }

    #[tokio::test]
    async fn idle_counter_shuts_down_immediately() {
        let counter = InFlightCounter::new();
        let started = std::time::Instant::now();
        counter
            .shutdown(Deadline::after(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
