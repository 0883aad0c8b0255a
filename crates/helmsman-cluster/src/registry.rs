//! ---
//! hm_section: "02-cluster-model"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Mutex-guarded node registry, the single source of truth for cluster state."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::node::{
    HealthCheckResult, HealthHistory, HealthVerdict, Node, NodeDescriptor, NodeSnapshot, NodeState,
};

#[derive(Debug)]
struct RegistryInner {
    nodes: IndexMap<String, Node>,
    current_primary: Option<String>,
}

/// Outcome of removing a node.
#[derive(Debug, Clone)]
pub struct RemovedNode {
    pub snapshot: NodeSnapshot,
    pub was_primary: bool,
}

/// Owns every [`Node`] in the cluster. All mutation happens behind one mutex;
/// readers receive snapshot copies and never hold the lock across
/// serialization or I/O.
#[derive(Debug)]
pub struct NodeRegistry {
    inner: Mutex<RegistryInner>,
    history_capacity: usize,
}

impl NodeRegistry {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                nodes: IndexMap::new(),
                current_primary: None,
            }),
            history_capacity: history_capacity.max(1),
        }
    }

    /// Insert a node. The first node declaring itself primary becomes the
    /// bootstrap primary; a later claimant is demoted to standby so the
    /// single-primary invariant holds from registration onward.
    pub fn insert(&self, descriptor: NodeDescriptor) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        if inner.nodes.contains_key(&descriptor.id) {
            return Err(RegistryError::DuplicateNode(descriptor.id));
        }
        let mut node = Node::from_descriptor(descriptor, self.history_capacity);
        if node.state == NodeState::Primary {
            if inner.current_primary.is_none() {
                inner.current_primary = Some(node.id.clone());
            } else {
                warn!(
                    node = %node.id,
                    primary = inner.current_primary.as_deref().unwrap_or_default(),
                    "node declared primary while one exists; registering as standby"
                );
                node.state = NodeState::Standby;
            }
        }
        debug!(node = %node.id, state = %node.state, priority = node.priority, "node registered");
        inner.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Remove a node. Removing the current primary clears the primary
    /// pointer; the caller must run a failover search immediately.
    pub fn remove(&self, node_id: &str) -> Result<RemovedNode, RegistryError> {
        let mut inner = self.inner.lock();
        let node = inner
            .nodes
            .shift_remove(node_id)
            .ok_or_else(|| RegistryError::UnknownNode(node_id.to_owned()))?;
        let was_primary = inner.current_primary.as_deref() == Some(node_id);
        if was_primary {
            inner.current_primary = None;
        }
        debug!(node = %node_id, was_primary, "node removed");
        Ok(RemovedNode {
            snapshot: node.snapshot(),
            was_primary,
        })
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.inner.lock().nodes.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().nodes.is_empty()
    }

    pub fn snapshot(&self, node_id: &str) -> Option<NodeSnapshot> {
        self.inner.lock().nodes.get(node_id).map(Node::snapshot)
    }

    /// Snapshot copies of every node, in registration order.
    pub fn snapshots(&self) -> Vec<NodeSnapshot> {
        self.inner.lock().nodes.values().map(Node::snapshot).collect()
    }

    pub fn current_primary(&self) -> Option<String> {
        self.inner.lock().current_primary.clone()
    }

    pub fn primary_snapshot(&self) -> Option<NodeSnapshot> {
        let inner = self.inner.lock();
        inner
            .current_primary
            .as_ref()
            .and_then(|id| inner.nodes.get(id))
            .map(Node::snapshot)
    }

    /// Nodes eligible for probing this tick: everything except maintenance
    /// members. Failed nodes stay in the set so recovery can be detected.
    pub fn probe_targets(&self) -> Vec<NodeSnapshot> {
        self.inner
            .lock()
            .nodes
            .values()
            .filter(|node| node.state != NodeState::Maintenance)
            .map(Node::snapshot)
            .collect()
    }

    /// Healthy secondaries and standbys ordered by `(priority desc,
    /// health_score desc)`. This ordering is the authoritative tie-break for
    /// promotion.
    pub fn candidates_for_promotion(&self) -> Vec<NodeSnapshot> {
        let mut candidates: Vec<NodeSnapshot> = self
            .inner
            .lock()
            .nodes
            .values()
            .filter(|node| {
                matches!(node.state, NodeState::Secondary | NodeState::Standby) && node.healthy
            })
            .map(Node::snapshot)
            .collect();
        candidates.sort_by(|a, b| {
            b.priority.cmp(&a.priority).then_with(|| {
                b.health_score
                    .partial_cmp(&a.health_score)
                    .unwrap_or(Ordering::Equal)
            })
        });
        candidates
    }

    /// Append a batch of probe results to a node's history, rescore it via
    /// the supplied verdict function, and stamp the heartbeat. The verdict
    /// function runs under the registry lock and must stay pure.
    pub fn record_results<F>(
        &self,
        node_id: &str,
        results: Vec<HealthCheckResult>,
        observed_at: DateTime<Utc>,
        verdict: F,
    ) -> Result<HealthVerdict, RegistryError>
    where
        F: FnOnce(&HealthHistory) -> HealthVerdict,
    {
        let mut inner = self.inner.lock();
        let node = inner
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| RegistryError::UnknownNode(node_id.to_owned()))?;
        for result in results {
            node.history.push(result);
        }
        let verdict = verdict(&node.history);
        node.health_score = verdict.score;
        node.healthy = verdict.healthy;
        node.last_heartbeat = observed_at;
        Ok(verdict)
    }

    /// Demote the old primary (if still present) and promote the new one in
    /// a single locked step. The promoted node's failover count increments
    /// and the primary pointer moves with the promotion.
    pub fn execute_failover(
        &self,
        old_primary: Option<&str>,
        new_primary: &str,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        if !inner.nodes.contains_key(new_primary) {
            return Err(RegistryError::UnknownNode(new_primary.to_owned()));
        }
        if let Some(old_id) = old_primary {
            if let Some(old) = inner.nodes.get_mut(old_id) {
                old.state = NodeState::Failed;
            }
        }
        let node = inner
            .nodes
            .get_mut(new_primary)
            .expect("presence checked above");
        node.state = NodeState::Primary;
        node.failover_count += 1;
        inner.current_primary = Some(new_primary.to_owned());
        Ok(())
    }

    /// Failed -> Recovering, driven by the recovery watcher.
    pub fn mark_recovering(&self, node_id: &str) -> Result<(), RegistryError> {
        self.transition(node_id, "recover", NodeState::Failed, NodeState::Recovering)
    }

    /// Recovering -> Standby, an explicit operator action. Recovered nodes
    /// re-enter the candidate pool only through this call.
    pub fn reinstate(&self, node_id: &str) -> Result<(), RegistryError> {
        self.transition(
            node_id,
            "reinstate",
            NodeState::Recovering,
            NodeState::Standby,
        )
    }

    /// Toggle maintenance. The current primary cannot enter maintenance;
    /// demote it through a failover first. Leaving maintenance lands on
    /// standby.
    pub fn set_maintenance(&self, node_id: &str, enabled: bool) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let is_primary = inner.current_primary.as_deref() == Some(node_id);
        let node = inner
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| RegistryError::UnknownNode(node_id.to_owned()))?;
        if enabled {
            if is_primary {
                return Err(RegistryError::InvalidTransition {
                    node: node_id.to_owned(),
                    state: node.state,
                    action: "put into maintenance",
                });
            }
            node.state = NodeState::Maintenance;
        } else {
            if node.state != NodeState::Maintenance {
                return Err(RegistryError::InvalidTransition {
                    node: node_id.to_owned(),
                    state: node.state,
                    action: "take out of maintenance",
                });
            }
            node.state = NodeState::Standby;
        }
        Ok(())
    }

    fn transition(
        &self,
        node_id: &str,
        action: &'static str,
        expected: NodeState,
        next: NodeState,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let node = inner
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| RegistryError::UnknownNode(node_id.to_owned()))?;
        if node.state != expected {
            return Err(RegistryError::InvalidTransition {
                node: node_id.to_owned(),
                state: node.state,
                action,
            });
        }
        node.state = next;
        debug!(node = %node_id, from = %expected, to = %next, "node state transition");
        Ok(())
    }
}
