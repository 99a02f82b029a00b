//! HTTP server setup.
//!
//! # Responsibilities
//! - Create Axum Router with the service handlers
//! - Count every request as in-flight work
//! - Serve HTTP/1.1 and HTTP/2 connections accepted by the draining listener
//! - Finish open connections gracefully once the listener starts closing

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::lifecycle::{InFlightCounter, ReadinessFlag};
use crate::net::{DrainingListener, ListenerError};
use crate::observability::metrics;

/// Longest delay `/sleep/{ms}` will honor.
const MAX_SLEEP_MS: u64 = 30_000;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub readiness: ReadinessFlag,
    pub inflight: InFlightCounter,
    pub listener: Arc<DrainingListener<TcpListener>>,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub version: &'static str,
    pub ready: bool,
    pub inflight_requests: u64,
    pub connections_accepted: u64,
    pub connections_closed: u64,
}

/// HTTP server running on a draining listener.
pub struct HttpServer {
    router: Router,
    listener: Arc<DrainingListener<TcpListener>>,
}

impl HttpServer {
    pub fn new(
        listener: Arc<DrainingListener<TcpListener>>,
        readiness: ReadinessFlag,
        inflight: InFlightCounter,
    ) -> Self {
        let state = AppState {
            readiness,
            inflight,
            listener: Arc::clone(&listener),
        };
        Self {
            router: Self::build_router(state),
            listener,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/readyz", get(readyz))
            .route("/status", get(status))
            .route("/sleep/{ms}", get(sleep))
            .layer(middleware::from_fn_with_state(state.clone(), track_inflight))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Accept and serve connections until the listener is closed.
    pub async fn run(self) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(address = %addr, "HTTP server starting");
        }
        let closing = self.listener.closing_token();

        loop {
            let (conn, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(ListenerError::Closed) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let service = TowerToHyperService::new(self.router.clone());
            let closing = closing.clone();
            tokio::spawn(async move {
                let connection_id = conn.id();
                let builder = Builder::new(TokioExecutor::new());
                let serving = builder.serve_connection(TokioIo::new(conn), service);
                tokio::pin!(serving);

                let result = tokio::select! {
                    result = serving.as_mut() => result,
                    _ = closing.cancelled() => {
                        serving.as_mut().graceful_shutdown();
                        serving.await
                    }
                };

                if let Err(err) = result {
                    tracing::debug!(connection_id = %connection_id, peer = %peer, error = %err, "Connection ended with error");
                }
            });
        }

        tracing::info!("HTTP server stopped accepting");
    }
}

async fn track_inflight(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let guard = state.inflight.track();
    metrics::set_inflight(state.inflight.count());

    let response = next.run(request).await;

    drop(guard);
    metrics::set_inflight(state.inflight.count());
    response
}

async fn index() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.readiness.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    }
}

async fn status(State(state): State<AppState>) -> Json<ServiceStatus> {
    let connections = state.listener.metrics();
    Json(ServiceStatus {
        version: env!("CARGO_PKG_VERSION"),
        ready: state.readiness.is_ready(),
        inflight_requests: state.inflight.count(),
        connections_accepted: connections.accepted,
        connections_closed: connections.closed,
    })
}

/// Holds the request open for `ms` milliseconds.
async fn sleep(Path(ms): Path<u64>) -> String {
    let ms = ms.min(MAX_SLEEP_MS);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    format!("slept {ms}ms")
}
