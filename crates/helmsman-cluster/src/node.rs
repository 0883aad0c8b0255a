//! ---
//! hm_section: "02-cluster-model"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Cluster node model and bounded health history."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use helmsman_common::config::{CheckKind, NodeConfig, NodeRole};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};

/// Runtime state of a cluster member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Primary,
    Secondary,
    Standby,
    Failed,
    Recovering,
    Maintenance,
}

impl NodeState {
    /// Stable label for logs, metrics, and status payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Primary => "primary",
            NodeState::Secondary => "secondary",
            NodeState::Standby => "standby",
            NodeState::Failed => "failed",
            NodeState::Recovering => "recovering",
            NodeState::Maintenance => "maintenance",
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<NodeRole> for NodeState {
    fn from(role: NodeRole) -> Self {
        match role {
            NodeRole::Primary => NodeState::Primary,
            NodeRole::Secondary => NodeState::Secondary,
            NodeRole::Standby => NodeState::Standby,
        }
    }
}

/// Outcome of a single probe execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Healthy,
    Unhealthy,
    Error,
}

impl ProbeStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeStatus::Healthy)
    }
}

/// Immutable record of one health check against one node.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthCheckResult {
    pub node_id: String,
    pub kind: CheckKind,
    pub status: ProbeStatus,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
}

impl HealthCheckResult {
    pub fn healthy(node_id: impl Into<String>, kind: CheckKind, latency: Duration) -> Self {
        Self {
            node_id: node_id.into(),
            kind,
            status: ProbeStatus::Healthy,
            latency,
            timestamp: Utc::now(),
            error: None,
            metadata: IndexMap::new(),
        }
    }

    pub fn unhealthy(
        node_id: impl Into<String>,
        kind: CheckKind,
        latency: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            kind,
            status: ProbeStatus::Unhealthy,
            latency,
            timestamp: Utc::now(),
            error: Some(error.into()),
            metadata: IndexMap::new(),
        }
    }

    pub fn error(
        node_id: impl Into<String>,
        kind: CheckKind,
        latency: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            kind,
            status: ProbeStatus::Error,
            latency,
            timestamp: Utc::now(),
            error: Some(error.into()),
            metadata: IndexMap::new(),
        }
    }

    /// Override the capture timestamp, mainly for scripted test fixtures.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Bounded ordered sequence of recent probe results, oldest evicted first.
#[derive(Debug, Clone)]
pub struct HealthHistory {
    results: VecDeque<HealthCheckResult>,
    capacity: usize,
}

impl HealthHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            results: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, result: HealthCheckResult) {
        if self.results.len() == self.capacity {
            self.results.pop_front();
        }
        self.results.push_back(result);
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &HealthCheckResult> {
        self.results.iter()
    }

    /// Newest to oldest.
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &HealthCheckResult> {
        self.results.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Health verdict derived from a node's history by the scoring layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthVerdict {
    pub score: f64,
    pub healthy: bool,
    pub consecutive_failures: u32,
}

/// Registration input describing a node before the registry takes ownership.
#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub role: NodeRole,
    pub priority: i32,
    pub capabilities: Vec<String>,
    pub metadata: IndexMap<String, String>,
}

impl NodeDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            host: "127.0.0.1".into(),
            port: 0,
            role: NodeRole::Standby,
            priority: 0,
            capabilities: Vec::new(),
            metadata: IndexMap::new(),
        }
    }

    pub fn from_config(id: &str, config: &NodeConfig) -> Self {
        Self {
            id: id.to_owned(),
            name: config.name.clone(),
            host: config.host.clone(),
            port: config.port,
            role: config.role,
            priority: config.priority,
            capabilities: config.capabilities.clone(),
            metadata: config.metadata.clone(),
        }
    }

    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }
}

/// One cluster member, owned exclusively by the registry.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub state: NodeState,
    pub priority: i32,
    pub capabilities: Vec<String>,
    pub health_score: f64,
    pub healthy: bool,
    pub last_heartbeat: DateTime<Utc>,
    pub history: HealthHistory,
    pub failover_count: u64,
    pub metadata: IndexMap<String, String>,
}

impl Node {
    pub fn from_descriptor(descriptor: NodeDescriptor, history_capacity: usize) -> Self {
        Self {
            id: descriptor.id,
            name: descriptor.name,
            host: descriptor.host,
            port: descriptor.port,
            state: descriptor.role.into(),
            priority: descriptor.priority,
            capabilities: descriptor.capabilities,
            health_score: 1.0,
            healthy: true,
            last_heartbeat: Utc::now(),
            history: HealthHistory::new(history_capacity),
            failover_count: 0,
            metadata: descriptor.metadata,
        }
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            state: self.state,
            priority: self.priority,
            capabilities: self.capabilities.clone(),
            health_score: self.health_score,
            healthy: self.healthy,
            last_heartbeat: self.last_heartbeat,
            failover_count: self.failover_count,
            metadata: self.metadata.clone(),
        }
    }
}

/// Read-only copy of a node, safe to hold outside the registry lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub state: NodeState,
    pub priority: i32,
    pub capabilities: Vec<String>,
    pub health_score: f64,
    pub healthy: bool,
    pub last_heartbeat: DateTime<Utc>,
    pub failover_count: u64,
    pub metadata: IndexMap<String, String>,
}
