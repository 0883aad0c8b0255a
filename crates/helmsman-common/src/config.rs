//! ---
//! hm_section: "01-core"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Shared primitives and configuration for the coordinator runtime."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_mode() -> Mode {
    Mode::Production
}

fn default_health_check_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_health_window() -> Duration {
    Duration::from_secs(60)
}

fn default_latency_window() -> Duration {
    Duration::from_secs(300)
}

fn default_failover_threshold() -> u32 {
    3
}

fn default_score_floor() -> f64 {
    0.5
}

fn default_healthy_ratio() -> f64 {
    0.8
}

fn default_history_capacity() -> usize {
    100
}

fn default_max_probe_parallelism() -> usize {
    32
}

fn default_checks() -> Vec<CheckKind> {
    vec![CheckKind::Heartbeat, CheckKind::Http, CheckKind::Tcp]
}

fn default_priority() -> i32 {
    0
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    "0.0.0.0:9898"
        .parse()
        .expect("valid default metrics address")
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_listen() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default api address")
}

fn default_simulation_seed() -> u64 {
    0xA11CEu64
}

/// Primary configuration object for the Helmsman runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "HELMSMAN_CONFIG";

    /// Load configuration from disk, respecting the `HELMSMAN_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Retrieve a node configuration by identifier.
    pub fn node(&self, node_id: &str) -> Option<&NodeConfig> {
        self.cluster.nodes.get(node_id)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;
        self.monitor.validate()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            cluster: ClusterConfig::default(),
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            api: ApiConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Operating mode for the coordinator.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Simulation,
}

impl Mode {
    pub fn is_simulation(&self) -> bool {
        matches!(self, Mode::Simulation)
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Mode::Production),
            "simulation" => Ok(Mode::Simulation),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// Cluster membership declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClusterConfig {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: IndexMap<String, NodeConfig>,
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(anyhow!("cluster must declare at least one node"));
        }
        let primaries = self
            .nodes
            .values()
            .filter(|n| matches!(n.role, NodeRole::Primary))
            .count();
        if primaries > 1 {
            return Err(anyhow!(
                "cluster declares {} primary nodes, at most one is allowed",
                primaries
            ));
        }
        Ok(())
    }
}

/// Static per-node declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub role: NodeRole,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
}

/// Role a node is declared with before the coordinator takes over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Primary,
    Secondary,
    #[default]
    Standby,
}

/// Health check kinds understood by the probe layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Heartbeat,
    Http,
    Tcp,
    Database,
    Custom,
}

impl CheckKind {
    /// Stable label for logs, metrics, and serialized results.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Heartbeat => "heartbeat",
            CheckKind::Http => "http",
            CheckKind::Tcp => "tcp",
            CheckKind::Database => "database",
            CheckKind::Custom => "custom",
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monitoring loop and health scoring parameters.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_health_check_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub health_check_interval: Duration,
    #[serde(default = "default_probe_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub probe_timeout: Duration,
    #[serde(default = "default_health_window")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub health_window: Duration,
    #[serde(default = "default_latency_window")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub latency_window: Duration,
    #[serde(default = "default_failover_threshold")]
    pub failover_threshold: u32,
    #[serde(default = "default_score_floor")]
    pub score_floor: f64,
    #[serde(default = "default_healthy_ratio")]
    pub healthy_ratio: f64,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_max_probe_parallelism")]
    pub max_probe_parallelism: usize,
    #[serde(default = "default_checks")]
    pub checks: Vec<CheckKind>,
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.checks.is_empty() {
            return Err(anyhow!("monitor must configure at least one check kind"));
        }
        if !(0.0..=1.0).contains(&self.score_floor) {
            return Err(anyhow!(
                "monitor score_floor {} must lie in [0, 1]",
                self.score_floor
            ));
        }
        if !(0.0..=1.0).contains(&self.healthy_ratio) {
            return Err(anyhow!(
                "monitor healthy_ratio {} must lie in [0, 1]",
                self.healthy_ratio
            ));
        }
        if self.failover_threshold == 0 {
            return Err(anyhow!("monitor failover_threshold must be at least 1"));
        }
        if self.history_capacity == 0 {
            return Err(anyhow!("monitor history_capacity must be at least 1"));
        }
        if self.max_probe_parallelism == 0 {
            return Err(anyhow!("monitor max_probe_parallelism must be at least 1"));
        }
        Ok(())
    }

    /// Effective probe pool size for a cluster of `node_count` members.
    pub fn probe_parallelism(&self, node_count: usize) -> usize {
        node_count.clamp(1, self.max_probe_parallelism)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            health_check_interval: default_health_check_interval(),
            probe_timeout: default_probe_timeout(),
            health_window: default_health_window(),
            latency_window: default_latency_window(),
            failover_threshold: default_failover_threshold(),
            score_floor: default_score_floor(),
            healthy_ratio: default_healthy_ratio(),
            history_capacity: default_history_capacity(),
            max_probe_parallelism: default_max_probe_parallelism(),
            checks: default_checks(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            listen: default_api_listen(),
        }
    }
}

/// Controls for the randomized probe used outside production deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub enable_randomized_probes: bool,
    #[serde(default = "default_simulation_seed")]
    pub random_seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enable_randomized_probes: true,
            random_seed: default_simulation_seed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [cluster.nodes.alpha]
        name = "alpha"
        host = "10.0.0.10"
        port = 7000
        role = "primary"
        priority = 100

        [cluster.nodes.beta]
        name = "beta"
        host = "10.0.0.11"
        port = 7000
        role = "secondary"
        priority = 90
    "#;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: AppConfig = MINIMAL.parse().expect("config parses");
        assert_eq!(config.mode, Mode::Production);
        assert_eq!(config.cluster.nodes.len(), 2);
        assert_eq!(
            config.monitor.health_check_interval,
            Duration::from_secs(10)
        );
        assert_eq!(config.monitor.failover_threshold, 3);
        assert_eq!(config.monitor.history_capacity, 100);
        assert_eq!(config.monitor.checks, default_checks());
        let alpha = config.node("alpha").expect("alpha present");
        assert_eq!(alpha.role, NodeRole::Primary);
        assert_eq!(alpha.priority, 100);
    }

    #[test]
    fn empty_cluster_is_rejected() {
        let err = "".parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("at least one node"));
    }

    #[test]
    fn two_declared_primaries_are_rejected() {
        let raw = r#"
            [cluster.nodes.a]
            name = "a"
            host = "h"
            port = 1
            role = "primary"

            [cluster.nodes.b]
            name = "b"
            host = "h"
            port = 2
            role = "primary"
        "#;
        let err = raw.parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("at most one"));
    }

    #[test]
    fn monitor_overrides_round_trip() {
        let raw = r#"
            [cluster.nodes.a]
            name = "a"
            host = "h"
            port = 1
            role = "primary"

            [monitor]
            health_check_interval = 2
            probe_timeout = 1
            failover_threshold = 5
            checks = ["heartbeat", "database"]
        "#;
        let config: AppConfig = raw.parse().expect("config parses");
        assert_eq!(config.monitor.health_check_interval, Duration::from_secs(2));
        assert_eq!(config.monitor.probe_timeout, Duration::from_secs(1));
        assert_eq!(config.monitor.failover_threshold, 5);
        assert_eq!(
            config.monitor.checks,
            vec![CheckKind::Heartbeat, CheckKind::Database]
        );

        let serialized = toml::to_string(&config).expect("config serializes");
        let reparsed: AppConfig = serialized.parse().expect("round trip parses");
        assert_eq!(reparsed.monitor.failover_threshold, 5);
    }

    #[test]
    fn probe_parallelism_is_capped() {
        let monitor = MonitorConfig::default();
        assert_eq!(monitor.probe_parallelism(3), 3);
        assert_eq!(monitor.probe_parallelism(0), 1);
        assert_eq!(monitor.probe_parallelism(500), 32);
    }

    #[test]
    fn invalid_score_floor_is_rejected() {
        let raw = r#"
            [cluster.nodes.a]
            name = "a"
            host = "h"
            port = 1

            [monitor]
            score_floor = 1.5
        "#;
        let err = raw.parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("score_floor"));
    }
}
