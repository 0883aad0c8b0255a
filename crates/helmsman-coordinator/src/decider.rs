//! ---
//! hm_section: "04-failover-coordination"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Pure failover decision rules."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use std::fmt;

use helmsman_cluster::{NodeRegistry, NodeSnapshot};
use helmsman_common::config::MonitorConfig;

/// Health view of the current primary fed into the decision function.
#[derive(Debug, Clone)]
pub struct PrimaryHealth {
    pub node_id: String,
    pub health_score: f64,
    pub consecutive_failures: u32,
}

/// Why a failover is required.
#[derive(Debug, Clone, PartialEq)]
pub enum FailoverReason {
    NoPrimary,
    PrimaryUnhealthy {
        node_id: String,
        score: f64,
        consecutive_failures: u32,
    },
}

impl fmt::Display for FailoverReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailoverReason::NoPrimary => write!(f, "no primary node available"),
            FailoverReason::PrimaryUnhealthy {
                node_id,
                score,
                consecutive_failures,
            } => write!(
                f,
                "primary node {} is unhealthy (score {:.2}, {} consecutive failures)",
                node_id, score, consecutive_failures
            ),
        }
    }
}

/// Pure decision function: no I/O, no clock, no registry mutation.
#[derive(Debug, Clone)]
pub struct FailoverDecider {
    score_floor: f64,
    failure_threshold: u32,
}

impl FailoverDecider {
    pub fn new(monitor: &MonitorConfig) -> Self {
        Self {
            score_floor: monitor.score_floor,
            failure_threshold: monitor.failover_threshold,
        }
    }

    /// A failover is required when no primary exists, or when the primary's
    /// score has dropped below the floor for at least the configured number
    /// of consecutive failures.
    pub fn should_failover(&self, primary: Option<&PrimaryHealth>) -> Option<FailoverReason> {
        match primary {
            None => Some(FailoverReason::NoPrimary),
            Some(primary) => {
                if primary.health_score < self.score_floor
                    && primary.consecutive_failures >= self.failure_threshold
                {
                    Some(FailoverReason::PrimaryUnhealthy {
                        node_id: primary.node_id.clone(),
                        score: primary.health_score,
                        consecutive_failures: primary.consecutive_failures,
                    })
                } else {
                    None
                }
            }
        }
    }

    /// The best current candidate, if any: the head of the registry's
    /// `(priority desc, health_score desc)` ordering.
    pub fn select_candidate(&self, registry: &NodeRegistry) -> Option<NodeSnapshot> {
        registry.candidates_for_promotion().into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decider() -> FailoverDecider {
        FailoverDecider::new(&MonitorConfig::default())
    }

    fn primary(score: f64, failures: u32) -> PrimaryHealth {
        PrimaryHealth {
            node_id: "p".into(),
            health_score: score,
            consecutive_failures: failures,
        }
    }

    #[test]
    fn missing_primary_forces_failover() {
        assert_eq!(
            decider().should_failover(None),
            Some(FailoverReason::NoPrimary)
        );
    }

    #[test]
    fn both_conditions_must_hold() {
        let decider = decider();
        // Low score alone is not enough.
        assert!(decider.should_failover(Some(&primary(0.2, 2))).is_none());
        // Failure streak alone is not enough.
        assert!(decider.should_failover(Some(&primary(0.9, 10))).is_none());
        // Score exactly at the floor does not trip the strict comparison.
        assert!(decider.should_failover(Some(&primary(0.5, 10))).is_none());
        // Both together do.
        assert!(matches!(
            decider.should_failover(Some(&primary(0.49, 3))),
            Some(FailoverReason::PrimaryUnhealthy { .. })
        ));
    }

    #[test]
    fn reason_is_human_readable() {
        let reason = decider()
            .should_failover(Some(&primary(0.1, 4)))
            .expect("failover required");
        let text = reason.to_string();
        assert!(text.contains("primary node p"));
        assert!(text.contains("4 consecutive failures"));
    }
}
