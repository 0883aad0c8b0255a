//! ---
//! hm_section: "01-core"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Shared primitives and configuration for the coordinator runtime."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
//! Core shared primitives for the Helmsman workspace.
//! This crate exposes configuration loading, logging bootstrap, and time
//! utilities consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    ApiConfig, AppConfig, CheckKind, ClusterConfig, LoggingConfig, MetricsConfig, Mode,
    MonitorConfig, NodeConfig, NodeRole, SimulationConfig,
};
pub use logging::{init_tracing, LogFormat};
