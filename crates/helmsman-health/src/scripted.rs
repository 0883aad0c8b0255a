//! ---
//! hm_section: "03-health-monitoring"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Deterministic scripted probe for tests."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use helmsman_cluster::{HealthCheckResult, NodeSnapshot, ProbeStatus};
use helmsman_common::config::CheckKind;
use parking_lot::Mutex;

use crate::probe::HealthProbe;

/// One scripted probe outcome.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    pub latency: Duration,
}

impl ProbeOutcome {
    pub fn healthy() -> Self {
        Self {
            status: ProbeStatus::Healthy,
            latency: Duration::from_millis(10),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            status: ProbeStatus::Unhealthy,
            latency: Duration::from_millis(10),
        }
    }

    pub fn error() -> Self {
        Self {
            status: ProbeStatus::Error,
            latency: Duration::from_millis(10),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    queued: HashMap<String, VecDeque<ProbeOutcome>>,
    fallback: HashMap<String, ProbeOutcome>,
}

/// Fully deterministic probe: per-node queues of scripted outcomes with a
/// per-node fallback once a queue drains. Nodes without a script report
/// healthy.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    state: Mutex<ScriptState>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes consumed one per check, oldest first.
    pub fn enqueue(&self, node_id: &str, outcomes: impl IntoIterator<Item = ProbeOutcome>) {
        let mut state = self.state.lock();
        state
            .queued
            .entry(node_id.to_owned())
            .or_default()
            .extend(outcomes);
    }

    /// Fix the outcome returned once the node's queue is empty.
    pub fn set_fallback(&self, node_id: &str, outcome: ProbeOutcome) {
        self.state.lock().fallback.insert(node_id.to_owned(), outcome);
    }

    fn next_outcome(&self, node_id: &str) -> ProbeOutcome {
        let mut state = self.state.lock();
        if let Some(queue) = state.queued.get_mut(node_id) {
            if let Some(outcome) = queue.pop_front() {
                return outcome;
            }
        }
        state
            .fallback
            .get(node_id)
            .copied()
            .unwrap_or_else(ProbeOutcome::healthy)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn check(&self, node: &NodeSnapshot, kind: CheckKind) -> HealthCheckResult {
        let outcome = self.next_outcome(&node.id);
        match outcome.status {
            ProbeStatus::Healthy => HealthCheckResult::healthy(&node.id, kind, outcome.latency),
            ProbeStatus::Unhealthy => HealthCheckResult::unhealthy(
                &node.id,
                kind,
                outcome.latency,
                "scripted unhealthy outcome",
            ),
            ProbeStatus::Error => {
                HealthCheckResult::error(&node.id, kind, outcome.latency, "scripted probe error")
            }
        }
    }
}
