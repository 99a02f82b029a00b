//! Draining listener.
//!
//! # Responsibilities
//! - Wrap any accepting listener (TCP, Unix, in-memory)
//! - Track every accepted connection until its owner closes it
//! - On close: stop accepting first, then wait for open connections to drain
//!
//! # Design Decisions
//! - Close has no deadline of its own; register the listener with the
//!   shutdown coordinator to bound it
//! - Pending accepts are woken by a cancellation token, so closing never
//!   waits on a blocked accept

use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ListenerConfig;
use crate::error::BoxError;
use crate::lifecycle::module::ShutdownModule;
use crate::lifecycle::wait::Deadline;
use crate::net::connection::{ConnectionTracker, ListenerMetrics, TrackedConnection};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[source] io::Error),

    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] io::Error),

    /// The listener was closed.
    #[error("Listener closed")]
    Closed,

    /// The drain wait was abandoned by its owner.
    #[error("Drain abandoned with {open} connection(s) still open")]
    DrainAbandoned { open: u64 },
}

/// A source of incoming connections.
pub trait Listener: Send + Sync + 'static {
    type Io: Send + 'static;
    type Addr: Send + 'static;

    fn accept(&self) -> impl Future<Output = io::Result<(Self::Io, Self::Addr)>> + Send;

    fn local_addr(&self) -> io::Result<Self::Addr>;
}

impl Listener for TcpListener {
    type Io = tokio::net::TcpStream;
    type Addr = std::net::SocketAddr;

    fn accept(&self) -> impl Future<Output = io::Result<(Self::Io, Self::Addr)>> + Send {
        TcpListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        TcpListener::local_addr(self)
    }
}

#[cfg(unix)]
impl Listener for tokio::net::UnixListener {
    type Io = tokio::net::UnixStream;
    type Addr = tokio::net::unix::SocketAddr;

    fn accept(&self) -> impl Future<Output = io::Result<(Self::Io, Self::Addr)>> + Send {
        tokio::net::UnixListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        tokio::net::UnixListener::local_addr(self)
    }
}

/// Listener whose close waits for every accepted connection to finish.
pub struct DrainingListener<L> {
    /// `None` once closed. Pending accepts hold their own clone until woken.
    inner: Mutex<Option<Arc<L>>>,
    tracker: ConnectionTracker,
    closing: CancellationToken,
}

impl<L: Listener> DrainingListener<L> {
    pub fn new(listener: L) -> Self {
        Self {
            inner: Mutex::new(Some(Arc::new(listener))),
            tracker: ConnectionTracker::new(),
            closing: CancellationToken::new(),
        }
    }

    /// Accept the next connection and start tracking it.
    ///
    /// Accept failures are passed through untouched and not counted. Returns
    /// [`ListenerError::Closed`] once [`DrainingListener::close`] has started.
    pub async fn accept(&self) -> Result<(TrackedConnection<L::Io>, L::Addr), ListenerError> {
        let listener = self.listener().ok_or(ListenerError::Closed)?;

        let (io, addr) = tokio::select! {
            biased;
            _ = self.closing.cancelled() => return Err(ListenerError::Closed),
            accepted = listener.accept() => accepted.map_err(ListenerError::Accept)?,
        };

        let guard = self.tracker.track();
        tracing::debug!(connection_id = %guard.id(), open = self.tracker.active_count(), "Connection accepted");
        Ok((TrackedConnection::new(io, guard), addr))
    }

    /// Close the listener, then wait until every accepted connection closed.
    ///
    /// Returns [`ListenerError::Closed`] if already closed. The drain wait
    /// itself never fails and has no deadline.
    pub async fn close(&self) -> Result<(), ListenerError> {
        let listener = self.slot().take().ok_or(ListenerError::Closed)?;
        self.closing.cancel();
        drop(listener);

        let open = self.tracker.active_count();
        tracing::info!(open, "Listener closed, draining connections");

        self.tracker.wait_for_drain().await;

        let metrics = self.tracker.metrics();
        tracing::info!(
            accepted = metrics.accepted,
            closed = metrics.closed,
            "All connections drained"
        );
        Ok(())
    }

    pub fn local_addr(&self) -> Result<L::Addr, ListenerError> {
        let listener = self.listener().ok_or(ListenerError::Closed)?;
        listener.local_addr().map_err(ListenerError::Accept)
    }

    /// Cumulative accepted and closed counts.
    pub fn metrics(&self) -> ListenerMetrics {
        self.tracker.metrics()
    }

    /// Connections currently open.
    pub fn open_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Token cancelled when closing starts.
    ///
    /// Connection handlers watch it to finish their current exchange and
    /// close instead of waiting for the peer.
    pub fn closing_token(&self) -> CancellationToken {
        self.closing.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closing.is_cancelled()
    }

    fn listener(&self) -> Option<Arc<L>> {
        self.slot().clone()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<L>>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DrainingListener<TcpListener> {
    /// Bind a TCP listener to the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(&config.bind_address)
            .await
            .map_err(ListenerError::Bind)?;

        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self::new(listener))
    }
}

#[async_trait]
impl<L: Listener> ShutdownModule for DrainingListener<L> {
    /// Close and drain, giving up once the deadline's owner abandons the wait.
    async fn shutdown(&self, deadline: Deadline) -> Result<(), BoxError> {
        tokio::select! {
            closed = self.close() => closed.map_err(Into::into),
            _ = deadline.cancelled() => Err(ListenerError::DrainAbandoned {
                open: self.tracker.active_count(),
            }
            .into()),
        }
    }
}
