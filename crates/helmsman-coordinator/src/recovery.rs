//! ---
//! hm_section: "04-failover-coordination"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Detects failed nodes turning healthy again."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use std::collections::HashMap;

use helmsman_cluster::{HealthVerdict, NodeRegistry, NodeState};
use tracing::{info, warn};

/// Watches failed nodes and moves them to `Recovering` once their probes
/// report healthy again. A recovering node never re-enters the candidate
/// pool on its own; an operator reinstates it explicitly.
#[derive(Debug, Default)]
pub struct RecoveryWatcher;

impl RecoveryWatcher {
    pub fn new() -> Self {
        Self
    }

    /// Transition every failed node whose verdict this tick is healthy.
    /// Returns the ids that recovered, each of which fires `on_recovery`
    /// exactly once because the state leaves `Failed` here.
    pub fn sweep(
        &self,
        registry: &NodeRegistry,
        verdicts: &HashMap<String, HealthVerdict>,
    ) -> Vec<String> {
        let mut recovered = Vec::new();
        for snapshot in registry.snapshots() {
            if snapshot.state != NodeState::Failed {
                continue;
            }
            let Some(verdict) = verdicts.get(&snapshot.id) else {
                continue;
            };
            if !verdict.healthy {
                continue;
            }
            match registry.mark_recovering(&snapshot.id) {
                Ok(()) => {
                    info!(node = %snapshot.id, score = verdict.score, "failed node is healthy again, marking as recovering");
                    recovered.push(snapshot.id);
                }
                Err(err) => {
                    // The node changed state between snapshot and transition.
                    warn!(node = %snapshot.id, error = %err, "recovery transition skipped");
                }
            }
        }
        recovered
    }
}
