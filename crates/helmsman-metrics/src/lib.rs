//! ---
//! hm_section: "05-observability"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Metrics collection and export utilities."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{response::IntoResponse, Router};
use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across the workspace.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Spawn an HTTP server that exposes the registry at `/metrics`.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {}", addr))?;
    std_listener
        .set_nonblocking(true)
        .with_context(|| "failed to configure metrics listener as non-blocking")?;
    let listener = TcpListener::from_std(std_listener)
        .with_context(|| "failed to convert std listener into tokio listener")?;

    info!(address = %addr, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let service = app.into_make_service();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

/// Prometheus scrape endpoint.
async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_str(encoder.format_type())
                    .unwrap_or_else(|_| HeaderValue::from_static("text/plain")),
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("metrics encoding error"),
            )
                .into_response()
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    /// Return the bound address for convenience.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Metrics recorded by the failover coordinator.
#[derive(Clone, Debug)]
pub struct CoordinatorMetrics {
    registry: SharedRegistry,
    failovers: IntCounterVec,
    recoveries: IntCounterVec,
    node_health_score: GaugeVec,
    node_primary: IntGaugeVec,
    cluster_state: IntGauge,
    probe_latency_seconds: Histogram,
}

impl CoordinatorMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let failovers = IntCounterVec::new(
            Opts::new(
                "helmsman_failovers_total",
                "Count of primary promotions by demoted node, promoted node, and trigger",
            ),
            &["from", "to", "trigger"],
        )?;
        registry.register(Box::new(failovers.clone()))?;

        let recoveries = IntCounterVec::new(
            Opts::new(
                "helmsman_recoveries_total",
                "Count of failed nodes transitioning back to recovering",
            ),
            &["node"],
        )?;
        registry.register(Box::new(recoveries.clone()))?;

        let node_health_score = GaugeVec::new(
            Opts::new(
                "helmsman_node_health_score",
                "Most recent health score per node in [0, 1]",
            ),
            &["node"],
        )?;
        registry.register(Box::new(node_health_score.clone()))?;

        let node_primary = IntGaugeVec::new(
            Opts::new(
                "helmsman_node_primary",
                "Indicator (0/1) whether a node currently holds the primary role",
            ),
            &["node"],
        )?;
        registry.register(Box::new(node_primary.clone()))?;

        let cluster_state = IntGauge::with_opts(Opts::new(
            "helmsman_cluster_state",
            "Coordinator state: 0 normal, 1 failover in progress, 2 degraded",
        ))?;
        registry.register(Box::new(cluster_state.clone()))?;

        let buckets = prometheus::exponential_buckets(0.005, 2.0, 12)
            .context("failed to construct histogram buckets")?;
        let probe_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "helmsman_probe_latency_seconds",
                "Observed health probe latency",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(probe_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            failovers,
            recoveries,
            node_health_score,
            node_primary,
            cluster_state,
            probe_latency_seconds,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_failover(&self, from: &str, to: &str, trigger: &str) {
        self.failovers.with_label_values(&[from, to, trigger]).inc();
    }

    pub fn record_recovery(&self, node: &str) {
        self.recoveries.with_label_values(&[node]).inc();
    }

    pub fn set_health_score(&self, node: &str, score: f64) {
        self.node_health_score.with_label_values(&[node]).set(score);
    }

    pub fn set_primary(&self, node: &str, primary: bool) {
        self.node_primary
            .with_label_values(&[node])
            .set(if primary { 1 } else { 0 });
    }

    pub fn set_cluster_state(&self, encoded: i64) {
        self.cluster_state.set(encoded);
    }

    pub fn observe_probe_latency(&self, latency: Duration) {
        self.probe_latency_seconds.observe(latency.as_secs_f64());
    }

    /// Drop gauges for a node that left the cluster.
    pub fn forget_node(&self, node: &str) {
        let _ = self.node_health_score.remove_label_values(&[node]);
        let _ = self.node_primary.remove_label_values(&[node]);
    }
}
