//! ---
//! hm_section: "03-health-monitoring"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Seeded randomized probe for simulation deployments."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;
use helmsman_cluster::{HealthCheckResult, NodeSnapshot};
use helmsman_common::config::CheckKind;
use helmsman_common::time::monotonic_now;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::probe::HealthProbe;

/// Per-kind probe characteristics: failure probability and latency range.
#[derive(Debug, Clone, Copy)]
struct CheckProfile {
    failure_rate: f64,
    latency_min: Duration,
    latency_max: Duration,
    failure_message: &'static str,
}

fn profile(kind: CheckKind) -> CheckProfile {
    match kind {
        CheckKind::Heartbeat => CheckProfile {
            failure_rate: 0.05,
            latency_min: Duration::from_millis(100),
            latency_max: Duration::from_millis(1_000),
            failure_message: "heartbeat timeout",
        },
        CheckKind::Http => CheckProfile {
            failure_rate: 0.08,
            latency_min: Duration::from_millis(200),
            latency_max: Duration::from_millis(1_500),
            failure_message: "http endpoint not responding",
        },
        CheckKind::Tcp => CheckProfile {
            failure_rate: 0.0,
            latency_min: Duration::from_millis(50),
            latency_max: Duration::from_millis(500),
            failure_message: "tcp connect refused",
        },
        CheckKind::Database => CheckProfile {
            failure_rate: 0.06,
            latency_min: Duration::from_millis(300),
            latency_max: Duration::from_millis(2_000),
            failure_message: "database connection failed",
        },
        CheckKind::Custom => CheckProfile {
            failure_rate: 0.0,
            latency_min: Duration::from_millis(100),
            latency_max: Duration::from_millis(1_000),
            failure_message: "custom check failed",
        },
    }
}

/// Randomized probe with seeded, reproducible failure injection. Each check
/// kind carries its own failure probability and latency envelope.
#[derive(Debug)]
pub struct SimulatedProbe {
    rng: Mutex<StdRng>,
    sleep_latency: bool,
    inject_failures: bool,
}

impl SimulatedProbe {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            sleep_latency: true,
            inject_failures: true,
        }
    }

    /// Skip the latency sleep so tests can drive ticks without waiting.
    pub fn without_latency(mut self) -> Self {
        self.sleep_latency = false;
        self
    }

    /// Keep the latency envelope but never inject failures.
    pub fn fault_free(mut self) -> Self {
        self.inject_failures = false;
        self
    }

    fn draw(&self, kind: CheckKind) -> (bool, Duration) {
        let profile = profile(kind);
        let mut rng = self.rng.lock();
        let latency_ms = rng.gen_range(
            profile.latency_min.as_millis() as u64..=profile.latency_max.as_millis() as u64,
        );
        let fails =
            self.inject_failures && profile.failure_rate > 0.0 && rng.gen_bool(profile.failure_rate);
        (fails, Duration::from_millis(latency_ms))
    }
}

#[async_trait]
impl HealthProbe for SimulatedProbe {
    async fn check(&self, node: &NodeSnapshot, kind: CheckKind) -> HealthCheckResult {
        let started = monotonic_now();
        let (fails, simulated_latency) = self.draw(kind);
        if self.sleep_latency {
            tokio::time::sleep(simulated_latency).await;
        }
        let latency = if self.sleep_latency {
            started.elapsed()
        } else {
            simulated_latency
        };
        if fails {
            HealthCheckResult::unhealthy(&node.id, kind, latency, profile(kind).failure_message)
        } else {
            HealthCheckResult::healthy(&node.id, kind, latency)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_cluster::{NodeDescriptor, ProbeStatus};

    fn snapshot() -> NodeSnapshot {
        let node = helmsman_cluster::Node::from_descriptor(NodeDescriptor::new("n1", "n1"), 10);
        node.snapshot()
    }

    #[tokio::test]
    async fn same_seed_reproduces_outcomes() {
        let node = snapshot();
        let mut first = Vec::new();
        let mut second = Vec::new();
        let a = SimulatedProbe::seeded(7).without_latency();
        let b = SimulatedProbe::seeded(7).without_latency();
        for _ in 0..50 {
            first.push(a.check(&node, CheckKind::Http).await.status);
            second.push(b.check(&node, CheckKind::Http).await.status);
        }
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn tcp_checks_never_fail() {
        let node = snapshot();
        let probe = SimulatedProbe::seeded(3).without_latency();
        for _ in 0..100 {
            let result = probe.check(&node, CheckKind::Tcp).await;
            assert_eq!(result.status, ProbeStatus::Healthy);
            assert!(result.latency >= Duration::from_millis(50));
            assert!(result.latency <= Duration::from_millis(500));
        }
    }

    #[tokio::test]
    async fn fault_free_probe_never_fails() {
        let node = snapshot();
        let probe = SimulatedProbe::seeded(0).without_latency().fault_free();
        for _ in 0..200 {
            let result = probe.check(&node, CheckKind::Http).await;
            assert_eq!(result.status, ProbeStatus::Healthy);
        }
    }

    #[tokio::test]
    async fn failures_carry_kind_specific_messages() {
        let node = snapshot();
        let probe = SimulatedProbe::seeded(0).without_latency();
        let mut saw_failure = false;
        for _ in 0..500 {
            let result = probe.check(&node, CheckKind::Database).await;
            if result.status == ProbeStatus::Unhealthy {
                assert_eq!(result.error.as_deref(), Some("database connection failed"));
                saw_failure = true;
            }
        }
        assert!(saw_failure, "6% failure rate over 500 draws never fired");
    }
}
