//! ---
//! hm_section: "01-core"
//! hm_subsection: "binary"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Binary entrypoint for the Helmsman daemon."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use helmsman_api::{spawn_api_server, ApiState};
use helmsman_cluster::NodeDescriptor;
use helmsman_common::config::{AppConfig, Mode};
use helmsman_common::init_tracing;
use helmsman_coordinator::FailoverCoordinator;
use helmsman_health::{HealthProbe, SimulatedProbe};
use helmsman_metrics::{new_registry, spawn_http_server, CoordinatorMetrics};
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Helmsman failover coordinator daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Override application mode")]
    mode: Option<CliMode>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMode {
    Production,
    Simulation,
}

impl From<CliMode> for Mode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Production => Mode::Production,
            CliMode::Simulation => Mode::Simulation,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the coordinator")]
    Run,
    #[command(about = "Validate the configuration and exit")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/example.prod.toml"));
    candidates.push(PathBuf::from("configs/example.dev.toml"));

    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if let Some(mode) = cli.mode {
        config.mode = mode.into();
    }

    if matches!(cli.command, Some(Commands::CheckConfig)) {
        println!(
            "configuration at {} is valid: {} nodes, tick every {}s",
            loaded.source.display(),
            config.cluster.nodes.len(),
            config.monitor.health_check_interval.as_secs()
        );
        return Ok(());
    }

    init_tracing("helmsmand", &config.logging)?;
    info!(
        config_path = %loaded.source.display(),
        load_ms = load_started.elapsed().as_millis() as u64,
        mode = ?config.mode,
        nodes = config.cluster.nodes.len(),
        "configuration loaded"
    );

    let metrics_registry = new_registry();
    let coordinator_metrics = CoordinatorMetrics::new(metrics_registry.clone())?;
    let metrics_server = if config.metrics.enabled {
        Some(spawn_http_server(
            metrics_registry.clone(),
            config.metrics.listen,
        )?)
    } else {
        None
    };

    // No real transport is wired in yet; both modes run the simulated probe,
    // with failure injection reserved for simulation deployments.
    let probe: Arc<dyn HealthProbe> = if config.mode.is_simulation()
        && config.simulation.enable_randomized_probes
    {
        Arc::new(SimulatedProbe::seeded(config.simulation.random_seed))
    } else {
        Arc::new(SimulatedProbe::seeded(config.simulation.random_seed).fault_free())
    };

    let coordinator = Arc::new(
        FailoverCoordinator::new(config.monitor.clone(), probe)
            .with_metrics(coordinator_metrics),
    );

    for (node_id, node_config) in &config.cluster.nodes {
        coordinator.register_node(NodeDescriptor::from_config(node_id, node_config))?;
    }

    coordinator.on_failover(Box::new(|event| {
        info!(
            event = %event.id,
            previous = event.previous_primary.as_deref().unwrap_or("none"),
            new = event.new_primary.as_deref().unwrap_or("none"),
            reason = %event.reason,
            "failover event"
        );
        Ok(())
    }));
    coordinator.on_recovery(Box::new(|node_id| {
        info!(node = %node_id, "node recovery event");
        Ok(())
    }));

    let api_server = if config.api.enabled {
        let state = Arc::new(ApiState::new(coordinator.clone(), config.mode));
        Some(spawn_api_server(state, config.api.listen)?)
    } else {
        None
    };

    let handle = coordinator.clone().start();
    info!("helmsmand running, press ctrl-c to stop");

    signal::ctrl_c().await?;
    info!("shutdown signal received");

    handle.shutdown().await?;
    if let Some(server) = api_server {
        if let Err(err) = server.shutdown().await {
            warn!(error = %err, "api server shutdown reported an error");
        }
    }
    if let Some(server) = metrics_server {
        if let Err(err) = server.shutdown().await {
            warn!(error = %err, "metrics server shutdown reported an error");
        }
    }
    info!("helmsmand stopped");
    Ok(())
}
