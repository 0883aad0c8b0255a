//! ---
//! hm_section: "04-failover-coordination"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Cluster-level state and status snapshots."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use helmsman_cluster::{FailoverEvent, NodeSnapshot};
use serde::Serialize;

/// Coordinator-level state, distinct from per-node [`helmsman_cluster::NodeState`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    Normal,
    FailoverInProgress,
    Degraded,
}

impl ClusterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterState::Normal => "normal",
            ClusterState::FailoverInProgress => "failover_in_progress",
            ClusterState::Degraded => "degraded",
        }
    }

    /// Encoding used for the cluster-state gauge.
    pub fn encode(&self) -> i64 {
        match self {
            ClusterState::Normal => 0,
            ClusterState::FailoverInProgress => 1,
            ClusterState::Degraded => 2,
        }
    }
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only, JSON-serializable snapshot of the whole cluster. Taken as a
/// copy outside the registry lock; two snapshots with no intervening ticks
/// carry identical data.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterStatus {
    pub primary_id: Option<String>,
    pub cluster_state: ClusterState,
    pub strategy: &'static str,
    pub total_nodes: usize,
    pub healthy_nodes: usize,
    pub failed_nodes: usize,
    pub nodes: Vec<NodeSnapshot>,
    pub recent_failover_events: Vec<FailoverEvent>,
}
