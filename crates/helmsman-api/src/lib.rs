//! ---
//! hm_section: "06-api"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Read-only status API surface for external consoles."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
//! Thin read-only HTTP surface over [`FailoverCoordinator`]. Handlers take
//! status snapshots and never mutate cluster state; all decision-making
//! stays in the coordinator.

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use helmsman_cluster::FailoverEvent;
use helmsman_common::config::Mode;
use helmsman_coordinator::{ClusterStatus, FailoverCoordinator};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const DEFAULT_EVENT_LIMIT: usize = 20;

/// Shared API state exposed to handlers.
pub struct ApiState {
    coordinator: Arc<FailoverCoordinator>,
    mode: Mode,
    start: Instant,
}

impl ApiState {
    pub fn new(coordinator: Arc<FailoverCoordinator>, mode: Mode) -> Self {
        Self {
            coordinator,
            mode,
            start: Instant::now(),
        }
    }

    fn status(&self) -> StatusResponse {
        StatusResponse {
            mode: self.mode,
            uptime_seconds: self.start.elapsed().as_secs(),
            cluster: self.coordinator.cluster_status(),
        }
    }

    fn events(&self, limit: usize) -> Vec<FailoverEvent> {
        self.coordinator.events().recent(limit)
    }
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    mode: Mode,
    uptime_seconds: u64,
    cluster: ClusterStatus,
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HealthzResponse {
    ok: bool,
}

/// Handle to the running API server.
#[derive(Debug)]
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ApiServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        }
    }
}

/// Spawn the status API.
pub fn spawn_api_server(state: Arc<ApiState>, addr: SocketAddr) -> Result<ApiServer> {
    let router = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/events", get(get_events))
        .route("/api/healthz", get(get_healthz))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    let addr = listener
        .local_addr()
        .context("failed to resolve bound API address")?;
    listener
        .set_nonblocking(true)
        .context("failed to configure API listener as non-blocking")?;
    let tcp_listener =
        TcpListener::from_std(listener).context("failed to create tokio listener")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        info!(address = %addr, "api server listening");
        if let Err(err) = axum::serve(tcp_listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            error!(address = %addr, error = %err, "api server exited with error");
            return Err(err.into());
        }
        Ok(())
    });

    Ok(ApiServer {
        addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

async fn get_status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(state.status())
}

async fn get_events(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<FailoverEvent>> {
    Json(state.events(query.limit.unwrap_or(DEFAULT_EVENT_LIMIT)))
}

async fn get_healthz() -> impl IntoResponse {
    Json(HealthzResponse { ok: true })
}
