//! ---
//! hm_section: "04-failover-coordination"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Failover coordinator state machine and monitoring loop."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use helmsman_cluster::{
    EventLog, FailoverEvent, FailoverTrigger, HealthCheckResult, HealthVerdict, NodeDescriptor,
    NodeRegistry, NodeState, RegistryError, STRATEGY_ACTIVE_PASSIVE,
};
use helmsman_common::config::MonitorConfig;
use helmsman_common::time::{jitter_us, monotonic_now};
use helmsman_health::{HealthProbe, HealthTracker};
use helmsman_metrics::CoordinatorMetrics;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::decider::{FailoverDecider, PrimaryHealth};
use crate::recovery::RecoveryWatcher;
use crate::status::{ClusterState, ClusterStatus};

const RECENT_EVENT_LIMIT: usize = 10;

/// Consumer hook invoked synchronously after a completed failover.
pub type FailoverCallback = Box<dyn Fn(&FailoverEvent) -> Result<()> + Send + Sync>;
/// Consumer hook invoked synchronously when a failed node starts recovering.
pub type RecoveryCallback = Box<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Orchestrates health monitoring and primary-role transfer for one cluster.
///
/// One coordinator owns one registry and one event log. The monitoring loop
/// probes concurrently but decides sequentially; failover transitions are
/// serialized through an internal guard so a second trigger queues behind an
/// in-flight one.
pub struct FailoverCoordinator {
    registry: Arc<NodeRegistry>,
    events: Arc<EventLog>,
    probe: Arc<dyn HealthProbe>,
    tracker: HealthTracker,
    decider: FailoverDecider,
    monitor: MonitorConfig,
    state: Mutex<ClusterState>,
    transition_guard: Mutex<()>,
    recovery: RecoveryWatcher,
    on_failover: Mutex<Vec<FailoverCallback>>,
    on_recovery: Mutex<Vec<RecoveryCallback>>,
    metrics: Option<CoordinatorMetrics>,
}

impl std::fmt::Debug for FailoverCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverCoordinator")
            .field("state", &*self.state.lock())
            .field("nodes", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl FailoverCoordinator {
    pub fn new(monitor: MonitorConfig, probe: Arc<dyn HealthProbe>) -> Self {
        let tracker = HealthTracker::new(&monitor);
        let decider = FailoverDecider::new(&monitor);
        Self {
            registry: Arc::new(NodeRegistry::new(monitor.history_capacity)),
            events: Arc::new(EventLog::new()),
            probe,
            tracker,
            decider,
            monitor,
            state: Mutex::new(ClusterState::Normal),
            transition_guard: Mutex::new(()),
            recovery: RecoveryWatcher::new(),
            on_failover: Mutex::new(Vec::new()),
            on_recovery: Mutex::new(Vec::new()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: CoordinatorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> Arc<NodeRegistry> {
        self.registry.clone()
    }

    pub fn events(&self) -> Arc<EventLog> {
        self.events.clone()
    }

    pub fn state(&self) -> ClusterState {
        *self.state.lock()
    }

    /// Register a consumer callback fired after every completed failover.
    /// Callbacks run on the monitoring loop and must not block significantly.
    pub fn on_failover(&self, callback: FailoverCallback) {
        self.on_failover.lock().push(callback);
    }

    /// Register a consumer callback fired when a failed node recovers.
    pub fn on_recovery(&self, callback: RecoveryCallback) {
        self.on_recovery.lock().push(callback);
    }

    pub fn register_node(&self, descriptor: NodeDescriptor) -> Result<(), RegistryError> {
        self.registry.insert(descriptor)
    }

    /// Remove a node. Removing the current primary synchronously runs a
    /// failover search so the cluster is not left primary-less across a tick
    /// boundary when a candidate exists.
    pub fn remove_node(&self, node_id: &str) -> Result<(), RegistryError> {
        let removed = self.registry.remove(node_id)?;
        if let Some(metrics) = &self.metrics {
            metrics.forget_node(node_id);
        }
        if removed.was_primary {
            warn!(node = %node_id, "current primary removed from the cluster");
            self.run_failover(
                format!("primary node {} removed", node_id),
                FailoverTrigger::System,
            );
        }
        Ok(())
    }

    pub fn set_node_maintenance(&self, node_id: &str, enabled: bool) -> Result<(), RegistryError> {
        self.registry.set_maintenance(node_id, enabled)
    }

    /// Return a recovering node to the standby pool.
    pub fn reinstate_node(&self, node_id: &str) -> Result<(), RegistryError> {
        self.registry.reinstate(node_id)
    }

    /// Operator-initiated failover, serialized with automatic triggers.
    pub fn trigger_failover(&self, reason: impl Into<String>) -> Option<FailoverEvent> {
        self.run_failover(reason.into(), FailoverTrigger::Manual)
    }

    /// Read-only snapshot of the cluster, safe to serialize without holding
    /// any coordinator lock.
    pub fn cluster_status(&self) -> ClusterStatus {
        let nodes = self.registry.snapshots();
        let healthy_nodes = nodes.iter().filter(|n| n.healthy).count();
        let failed_nodes = nodes
            .iter()
            .filter(|n| n.state == NodeState::Failed)
            .count();
        ClusterStatus {
            primary_id: self.registry.current_primary(),
            cluster_state: self.state(),
            strategy: STRATEGY_ACTIVE_PASSIVE,
            total_nodes: nodes.len(),
            healthy_nodes,
            failed_nodes,
            nodes,
            recent_failover_events: self.events.recent(RECENT_EVENT_LIMIT),
        }
    }

    /// One monitoring pass: concurrent probes, sequential decision, recovery
    /// sweep. Every failure path is contained here so a bad tick never halts
    /// the loop.
    pub async fn tick(&self) {
        let verdicts = self.probe_phase().await;
        self.decision_phase(&verdicts);
        self.recovery_phase(&verdicts);
        self.publish_metrics();
    }

    /// Probe every non-maintenance node for each configured check kind.
    /// Probes run concurrently under a bounded pool; a probe that exceeds
    /// the timeout is recorded as an error result with the timeout as its
    /// latency, never force-killed.
    async fn probe_phase(&self) -> HashMap<String, HealthVerdict> {
        let targets = self.registry.probe_targets();
        if targets.is_empty() {
            return HashMap::new();
        }
        let parallelism = self.monitor.probe_parallelism(targets.len());
        let timeout = self.monitor.probe_timeout;

        let mut jobs = Vec::with_capacity(targets.len() * self.monitor.checks.len());
        for node in targets {
            for kind in &self.monitor.checks {
                jobs.push((node.clone(), *kind));
            }
        }

        let probe = self.probe.clone();
        let results: Vec<HealthCheckResult> = stream::iter(jobs)
            .map(|(node, kind)| {
                let probe = probe.clone();
                async move {
                    match tokio::time::timeout(timeout, probe.check(&node, kind)).await {
                        Ok(result) => result,
                        Err(_) => {
                            HealthCheckResult::error(&node.id, kind, timeout, "probe timed out")
                        }
                    }
                }
            })
            .buffer_unordered(parallelism)
            .collect()
            .await;

        if let Some(metrics) = &self.metrics {
            for result in &results {
                metrics.observe_probe_latency(result.latency);
            }
        }

        let mut batches: HashMap<String, Vec<HealthCheckResult>> = HashMap::new();
        for result in results {
            batches.entry(result.node_id.clone()).or_default().push(result);
        }

        let now = Utc::now();
        let mut verdicts = HashMap::new();
        for (node_id, batch) in batches {
            match self.tracker.ingest(&self.registry, &node_id, batch, now) {
                Ok(verdict) => {
                    verdicts.insert(node_id, verdict);
                }
                Err(err) => {
                    // The node was removed while its probes were in flight.
                    debug!(node = %node_id, error = %err, "discarding probe results");
                }
            }
        }
        verdicts
    }

    /// Strictly sequential: evaluates the decider against the current
    /// primary and drives at most one failover transition.
    fn decision_phase(&self, verdicts: &HashMap<String, HealthVerdict>) {
        if self.registry.is_empty() {
            return;
        }
        let decision = match self.registry.current_primary() {
            None => self.decider.should_failover(None),
            Some(primary_id) => match verdicts.get(&primary_id) {
                Some(verdict) => {
                    let health = PrimaryHealth {
                        node_id: primary_id,
                        health_score: verdict.score,
                        consecutive_failures: verdict.consecutive_failures,
                    };
                    self.decider.should_failover(Some(&health))
                }
                // Registered after this tick's probe set was taken; wait for
                // the next tick rather than deciding on stale data.
                None => None,
            },
        };
        if let Some(reason) = decision {
            self.run_failover(reason.to_string(), FailoverTrigger::Automatic);
        }
    }

    fn recovery_phase(&self, verdicts: &HashMap<String, HealthVerdict>) {
        for node_id in self.recovery.sweep(&self.registry, verdicts) {
            if let Some(metrics) = &self.metrics {
                metrics.record_recovery(&node_id);
            }
            for callback in self.on_recovery.lock().iter() {
                if let Err(err) = callback(&node_id) {
                    warn!(node = %node_id, error = %err, "recovery callback failed");
                }
            }
        }
    }

    /// Select a candidate and transfer the primary role. Serialized: a
    /// second trigger blocks here until the first transition settles.
    fn run_failover(&self, reason: String, trigger: FailoverTrigger) -> Option<FailoverEvent> {
        let _guard = self.transition_guard.lock();
        warn!(reason = %reason, trigger = trigger.as_str(), "triggering failover");

        let prior_state = self.swap_state(ClusterState::FailoverInProgress);
        let old_primary = self.registry.current_primary();

        let Some(candidate) = self.decider.select_candidate(&self.registry) else {
            self.swap_state(ClusterState::Degraded);
            error!(reason = %reason, "no viable candidate for promotion, cluster degraded");
            // Record the failed search once per degradation, not every
            // retrying tick.
            if prior_state != ClusterState::Degraded {
                let event =
                    FailoverEvent::begin(old_primary, None, reason, trigger);
                let event_id = self.events.append(event);
                self.events.fail(event_id, Utc::now());
                return self.events.get(event_id);
            }
            return None;
        };

        let event = FailoverEvent::begin(
            old_primary.clone(),
            Some(candidate.id.clone()),
            reason,
            trigger,
        );
        let event_id = self.events.append(event);

        match self
            .registry
            .execute_failover(old_primary.as_deref(), &candidate.id)
        {
            Ok(()) => {
                self.events.complete(event_id, Utc::now());
                self.swap_state(ClusterState::Normal);
                info!(
                    old_primary = old_primary.as_deref().unwrap_or("none"),
                    new_primary = %candidate.id,
                    trigger = trigger.as_str(),
                    "failover completed"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_failover(
                        old_primary.as_deref().unwrap_or("none"),
                        &candidate.id,
                        trigger.as_str(),
                    );
                }
                let completed = self
                    .events
                    .get(event_id)
                    .expect("event appended above is present");
                for callback in self.on_failover.lock().iter() {
                    if let Err(err) = callback(&completed) {
                        warn!(event = %completed.id, error = %err, "failover callback failed");
                    }
                }
                Some(completed)
            }
            Err(err) => {
                // The candidate vanished mid-transition. Stay degraded and
                // let the next tick retry with fresh state.
                error!(candidate = %candidate.id, error = %err, "failover failed");
                self.events.fail(event_id, Utc::now());
                self.swap_state(ClusterState::Degraded);
                self.events.get(event_id)
            }
        }
    }

    fn swap_state(&self, next: ClusterState) -> ClusterState {
        let mut state = self.state.lock();
        let prior = *state;
        if prior != next {
            info!(from = %prior, to = %next, "cluster state transition");
        }
        *state = next;
        prior
    }

    fn publish_metrics(&self) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        metrics.set_cluster_state(self.state().encode());
        let primary = self.registry.current_primary();
        for snapshot in self.registry.snapshots() {
            metrics.set_health_score(&snapshot.id, snapshot.health_score);
            metrics.set_primary(&snapshot.id, primary.as_deref() == Some(&snapshot.id));
        }
    }

    /// Spawn the monitoring loop. The returned handle stops the timer and
    /// lets an in-flight tick finish before resolving.
    pub fn start(self: Arc<Self>) -> CoordinatorHandle {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(4);
        let coordinator = self.clone();
        let interval_duration = self.monitor.health_check_interval;
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_duration);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(
                interval_secs = interval_duration.as_secs(),
                "failover monitoring loop started"
            );
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("failover monitoring loop stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        let started = monotonic_now();
                        coordinator.tick().await;
                        let elapsed = started.elapsed();
                        if elapsed > interval_duration {
                            warn!(
                                overrun_us = jitter_us(elapsed, interval_duration),
                                "monitoring tick overran its interval"
                            );
                        }
                    }
                }
            }
        });
        CoordinatorHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running monitoring loop.
#[derive(Debug)]
pub struct CoordinatorHandle {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Stop the loop and wait for the in-flight tick to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task.await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use helmsman_cluster::{FailoverEventStatus, ProbeStatus};
    use helmsman_common::config::{CheckKind, NodeRole};
    use helmsman_health::{ProbeOutcome, ScriptedProbe};

    fn monitor() -> MonitorConfig {
        MonitorConfig {
            checks: vec![CheckKind::Heartbeat],
            probe_timeout: Duration::from_millis(200),
            ..MonitorConfig::default()
        }
    }

    fn coordinator_with(probe: Arc<ScriptedProbe>) -> FailoverCoordinator {
        FailoverCoordinator::new(monitor(), probe)
    }

    fn node(id: &str, role: NodeRole, priority: i32) -> NodeDescriptor {
        NodeDescriptor::new(id, format!("{}-server", id))
            .with_role(role)
            .with_priority(priority)
            .with_endpoint("192.168.1.10", 8080)
    }

    #[tokio::test]
    async fn healthy_cluster_stays_normal() {
        let probe = Arc::new(ScriptedProbe::new());
        let coordinator = coordinator_with(probe);
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();
        coordinator
            .register_node(node("b", NodeRole::Secondary, 90))
            .unwrap();

        for _ in 0..5 {
            coordinator.tick().await;
        }
        assert_eq!(coordinator.state(), ClusterState::Normal);
        let status = coordinator.cluster_status();
        assert_eq!(status.primary_id.as_deref(), Some("a"));
        assert!(status.recent_failover_events.is_empty());
    }

    #[tokio::test]
    async fn unhealthy_primary_fails_over_to_best_candidate() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.set_fallback("a", ProbeOutcome::unhealthy());
        let coordinator = coordinator_with(probe);
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();
        coordinator
            .register_node(node("b", NodeRole::Secondary, 90))
            .unwrap();
        coordinator
            .register_node(node("c", NodeRole::Standby, 80))
            .unwrap();

        // Three consecutive failing ticks reach the threshold.
        for _ in 0..3 {
            coordinator.tick().await;
        }

        let status = coordinator.cluster_status();
        assert_eq!(status.primary_id.as_deref(), Some("b"));
        assert_eq!(status.cluster_state, ClusterState::Normal);
        let nodes: HashMap<_, _> = status
            .nodes
            .iter()
            .map(|n| (n.id.clone(), n.state))
            .collect();
        assert_eq!(nodes["a"], NodeState::Failed);
        assert_eq!(nodes["b"], NodeState::Primary);
        assert_eq!(nodes["c"], NodeState::Standby);

        assert_eq!(status.recent_failover_events.len(), 1);
        let event = &status.recent_failover_events[0];
        assert_eq!(event.previous_primary.as_deref(), Some("a"));
        assert_eq!(event.new_primary.as_deref(), Some("b"));
        assert_eq!(event.status, FailoverEventStatus::Completed);
        assert_eq!(event.triggered_by, FailoverTrigger::Automatic);
        assert!(event.completed_at.is_some());
    }

    #[tokio::test]
    async fn failover_count_increments_once_per_promotion() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.set_fallback("a", ProbeOutcome::unhealthy());
        let coordinator = coordinator_with(probe);
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();
        coordinator
            .register_node(node("b", NodeRole::Secondary, 90))
            .unwrap();

        for _ in 0..6 {
            coordinator.tick().await;
        }
        let b = coordinator.registry().snapshot("b").unwrap();
        assert_eq!(b.failover_count, 1);
    }

    #[tokio::test]
    async fn no_candidate_leaves_cluster_degraded_without_silent_promotion() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.set_fallback("a", ProbeOutcome::unhealthy());
        probe.set_fallback("b", ProbeOutcome::unhealthy());
        let coordinator = coordinator_with(probe);
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();
        coordinator
            .register_node(node("b", NodeRole::Secondary, 90))
            .unwrap();

        for _ in 0..5 {
            coordinator.tick().await;
        }
        let status = coordinator.cluster_status();
        assert_eq!(status.cluster_state, ClusterState::Degraded);
        // The unhealthy secondary must not have been promoted.
        assert_ne!(status.primary_id.as_deref(), Some("b"));
        let failed_events: Vec<_> = status
            .recent_failover_events
            .iter()
            .filter(|e| e.status == FailoverEventStatus::Failed)
            .collect();
        assert_eq!(failed_events.len(), 1);
        assert!(failed_events[0].new_primary.is_none());
    }

    #[tokio::test]
    async fn degraded_cluster_recovers_when_a_candidate_appears() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.set_fallback("a", ProbeOutcome::unhealthy());
        let coordinator = coordinator_with(probe.clone());
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();

        for _ in 0..4 {
            coordinator.tick().await;
        }
        assert_eq!(coordinator.state(), ClusterState::Degraded);

        coordinator
            .register_node(node("b", NodeRole::Standby, 50))
            .unwrap();
        // First tick probes and scores the newcomer, the retrying search
        // then promotes it.
        coordinator.tick().await;
        let status = coordinator.cluster_status();
        assert_eq!(status.primary_id.as_deref(), Some("b"));
        assert_eq!(status.cluster_state, ClusterState::Normal);
    }

    #[tokio::test]
    async fn removing_sole_primary_degrades_the_cluster() {
        let probe = Arc::new(ScriptedProbe::new());
        let coordinator = coordinator_with(probe);
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();

        coordinator.remove_node("a").unwrap();
        let status = coordinator.cluster_status();
        assert_eq!(status.primary_id, None);
        assert_eq!(status.cluster_state, ClusterState::Degraded);
        assert_eq!(
            coordinator.remove_node("a").unwrap_err(),
            RegistryError::UnknownNode("a".into())
        );
    }

    #[tokio::test]
    async fn removing_primary_with_standby_promotes_immediately() {
        let probe = Arc::new(ScriptedProbe::new());
        let coordinator = coordinator_with(probe);
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();
        coordinator
            .register_node(node("b", NodeRole::Secondary, 90))
            .unwrap();

        coordinator.remove_node("a").unwrap();
        let status = coordinator.cluster_status();
        assert_eq!(status.primary_id.as_deref(), Some("b"));
        assert_eq!(status.cluster_state, ClusterState::Normal);
        let event = status.recent_failover_events.last().unwrap();
        assert_eq!(event.triggered_by, FailoverTrigger::System);
    }

    #[tokio::test]
    async fn manual_trigger_promotes_best_candidate() {
        let probe = Arc::new(ScriptedProbe::new());
        let coordinator = coordinator_with(probe);
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();
        coordinator
            .register_node(node("b", NodeRole::Secondary, 90))
            .unwrap();

        let event = coordinator
            .trigger_failover("planned switchover")
            .expect("event emitted");
        assert_eq!(event.status, FailoverEventStatus::Completed);
        assert_eq!(event.triggered_by, FailoverTrigger::Manual);
        assert_eq!(event.reason, "planned switchover");
        assert_eq!(
            coordinator.cluster_status().primary_id.as_deref(),
            Some("b")
        );
    }

    #[tokio::test]
    async fn recovery_fires_exactly_once_and_needs_reinstatement() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.set_fallback("a", ProbeOutcome::unhealthy());
        let coordinator = Arc::new(coordinator_with(probe.clone()));
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();
        coordinator
            .register_node(node("b", NodeRole::Secondary, 90))
            .unwrap();

        let recoveries = Arc::new(AtomicUsize::new(0));
        let counter = recoveries.clone();
        coordinator.on_recovery(Box::new(move |_node_id| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        for _ in 0..3 {
            coordinator.tick().await;
        }
        assert_eq!(
            coordinator.registry().snapshot("a").unwrap().state,
            NodeState::Failed
        );

        // The failed node turns healthy again. The streak of old failures
        // stays in the 60s window, so the 80% rule needs a dozen healthy
        // results before the verdict flips.
        probe.set_fallback("a", ProbeOutcome::healthy());
        for _ in 0..15 {
            coordinator.tick().await;
        }
        assert_eq!(recoveries.load(Ordering::SeqCst), 1);
        assert_eq!(
            coordinator.registry().snapshot("a").unwrap().state,
            NodeState::Recovering
        );
        // Recovering nodes are not candidates until reinstated.
        assert!(coordinator.registry().candidates_for_promotion().is_empty());

        coordinator.reinstate_node("a").unwrap();
        assert_eq!(
            coordinator
                .registry()
                .candidates_for_promotion()
                .first()
                .map(|n| n.id.clone())
                .as_deref(),
            Some("a")
        );
    }

    #[tokio::test]
    async fn callback_errors_are_swallowed() {
        let probe = Arc::new(ScriptedProbe::new());
        let coordinator = coordinator_with(probe);
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();
        coordinator
            .register_node(node("b", NodeRole::Secondary, 90))
            .unwrap();

        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = invocations.clone();
        coordinator.on_failover(Box::new(move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("consumer blew up"))
        }));

        let event = coordinator.trigger_failover("drill").expect("event");
        assert_eq!(event.status, FailoverEventStatus::Completed);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), ClusterState::Normal);
    }

    #[tokio::test]
    async fn status_is_idempotent_between_ticks() {
        let probe = Arc::new(ScriptedProbe::new());
        let coordinator = coordinator_with(probe);
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();
        coordinator.tick().await;

        let first = serde_json::to_value(coordinator.cluster_status()).unwrap();
        let second = serde_json::to_value(coordinator.cluster_status()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn probe_timeouts_become_error_results() {
        struct StuckProbe;

        #[async_trait::async_trait]
        impl HealthProbe for StuckProbe {
            async fn check(
                &self,
                node: &helmsman_cluster::NodeSnapshot,
                kind: CheckKind,
            ) -> HealthCheckResult {
                tokio::time::sleep(Duration::from_secs(60)).await;
                HealthCheckResult::healthy(&node.id, kind, Duration::ZERO)
            }
        }

        let coordinator = FailoverCoordinator::new(monitor(), Arc::new(StuckProbe));
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();
        coordinator.tick().await;

        let registry = coordinator.registry();
        let verdict = registry
            .record_results("a", Vec::new(), Utc::now(), |history| {
                let newest = history.iter_newest_first().next().expect("result recorded");
                assert_eq!(newest.status, ProbeStatus::Error);
                assert_eq!(newest.error.as_deref(), Some("probe timed out"));
                assert_eq!(newest.latency, Duration::from_millis(200));
                HealthVerdict {
                    score: 0.0,
                    healthy: false,
                    consecutive_failures: 1,
                }
            })
            .unwrap();
        assert!(!verdict.healthy);
    }

    #[tokio::test]
    async fn monitoring_loop_starts_and_stops() {
        let probe = Arc::new(ScriptedProbe::new());
        let monitor = MonitorConfig {
            health_check_interval: Duration::from_millis(20),
            checks: vec![CheckKind::Heartbeat],
            ..MonitorConfig::default()
        };
        let coordinator = Arc::new(FailoverCoordinator::new(monitor, probe));
        coordinator
            .register_node(node("a", NodeRole::Primary, 100))
            .unwrap();

        let handle = coordinator.clone().start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown().await.expect("clean shutdown");

        // The initial tick fired at least once and probed the node.
        let snapshot = coordinator.registry().snapshot("a").unwrap();
        assert!(snapshot.healthy);
    }
}
