//! Connection lifecycle tracking.
//!
//! # Responsibilities
//! - Count accepted and closed connections
//! - Generate unique connection IDs for tracing
//! - Wake drain waiters when the last connection closes
//! - Wrap accepted streams so closing them is tracked exactly once

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::sync::watch;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub(crate) fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Cumulative connection counts. Both only ever grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenerMetrics {
    pub accepted: u64,
    pub closed: u64,
}

impl ListenerMetrics {
    /// Connections accepted but not yet closed.
    pub fn open(&self) -> u64 {
        self.accepted.saturating_sub(self.closed)
    }
}

#[derive(Debug)]
struct TrackerInner {
    accepted: AtomicU64,
    closed: AtomicU64,
    /// Current open count; receivers wait on it reaching zero.
    open_tx: watch::Sender<u64>,
}

/// Tracks open connections for draining.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    inner: Arc<TrackerInner>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        let (open_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(TrackerInner {
                accepted: AtomicU64::new(0),
                closed: AtomicU64::new(0),
                open_tx,
            }),
        }
    }

    /// Record a new open connection. Returns a guard that records the close on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.inner.accepted.fetch_add(1, Ordering::SeqCst);
        let mut open = 0;
        self.inner.open_tx.send_modify(|count| {
            *count += 1;
            open = *count;
        });
        metrics::record_connection_accepted(open);

        ConnectionGuard {
            inner: Arc::clone(&self.inner),
            id: ConnectionId::next(),
        }
    }

    /// Get current open connection count.
    pub fn active_count(&self) -> u64 {
        *self.inner.open_tx.borrow()
    }

    /// Snapshot of the cumulative counts; `closed <= accepted` always holds.
    pub fn metrics(&self) -> ListenerMetrics {
        // Closed first: a close is always preceded by its accept.
        let closed = self.inner.closed.load(Ordering::SeqCst);
        let accepted = self.inner.accepted.load(Ordering::SeqCst);
        ListenerMetrics { accepted, closed }
    }

    /// Wait until every tracked connection has closed. No deadline.
    pub async fn wait_for_drain(&self) {
        let mut rx = self.inner.open_tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|open| *open == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
/// Records the close exactly once, when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    inner: Arc<TrackerInner>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.inner.closed.fetch_add(1, Ordering::SeqCst);
        let mut open = 0;
        self.inner.open_tx.send_modify(|count| {
            *count = count.saturating_sub(1);
            open = *count;
        });
        metrics::record_connection_closed(open);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// An accepted connection whose close is reported to its listener.
///
/// The close is recorded on the first [`TrackedConnection::close`] call or on
/// drop, whichever happens first.
#[derive(Debug)]
pub struct TrackedConnection<C> {
    inner: C,
    id: ConnectionId,
    guard: Option<ConnectionGuard>,
}

impl<C> TrackedConnection<C> {
    pub(crate) fn new(inner: C, guard: ConnectionGuard) -> Self {
        Self {
            inner,
            id: guard.id(),
            guard: Some(guard),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    /// True once the close has been recorded.
    pub fn is_closed(&self) -> bool {
        self.guard.is_none()
    }

    fn release(&mut self) {
        self.guard.take();
    }
}

impl<C: AsyncWrite + Unpin> TrackedConnection<C> {
    /// Record the close, then shut down the write side of the stream.
    ///
    /// Safe to call more than once; only the first call is counted.
    pub async fn close(&mut self) -> io::Result<()> {
        self.release();
        self.inner.shutdown().await
    }
}

impl<C: AsyncRead + Unpin> AsyncRead for TrackedConnection<C> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<C: AsyncWrite + Unpin> AsyncWrite for TrackedConnection<C> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}
