//! ---
//! hm_section: "03-health-monitoring"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Rolling health scoring over bounded probe history."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, Utc};
use helmsman_cluster::{
    HealthCheckResult, HealthHistory, HealthVerdict, NodeRegistry, RegistryError,
};
use helmsman_common::config::MonitorConfig;

/// Latency at or above this contributes nothing to the score's latency term.
const LATENCY_NORM: Duration = Duration::from_secs(5);

const SUCCESS_WEIGHT: f64 = 0.7;
const LATENCY_WEIGHT: f64 = 0.3;

/// Converts a node's probe history into a health score and verdict.
///
/// All computation is pure over the supplied history; the only side effect
/// is the registry write performed by [`HealthTracker::ingest`].
#[derive(Debug, Clone)]
pub struct HealthTracker {
    health_window: Duration,
    latency_window: Duration,
    healthy_ratio: f64,
}

impl HealthTracker {
    pub fn new(monitor: &MonitorConfig) -> Self {
        Self {
            health_window: monitor.health_window,
            latency_window: monitor.latency_window,
            healthy_ratio: monitor.healthy_ratio,
        }
    }

    /// Append a probe batch to the node's history, rescore it, and stamp the
    /// heartbeat, all in one registry operation.
    pub fn ingest(
        &self,
        registry: &NodeRegistry,
        node_id: &str,
        results: Vec<HealthCheckResult>,
        now: DateTime<Utc>,
    ) -> Result<HealthVerdict, RegistryError> {
        registry.record_results(node_id, results, now, |history| self.verdict(history, now))
    }

    /// Score and healthy verdict plus the trailing failure count.
    pub fn verdict(&self, history: &HealthHistory, now: DateTime<Utc>) -> HealthVerdict {
        HealthVerdict {
            score: self.score(history, now),
            healthy: self.is_healthy(history, now),
            consecutive_failures: consecutive_failures(history),
        }
    }

    /// A brand-new node with no history is healthy. A node whose entire
    /// history has aged out of the window is not. Otherwise the in-window
    /// success ratio must reach the configured threshold (default 80%).
    pub fn is_healthy(&self, history: &HealthHistory, now: DateTime<Utc>) -> bool {
        if history.is_empty() {
            return true;
        }
        let (total, successes) = self.window_counts(history, now, self.health_window);
        if total == 0 {
            return false;
        }
        successes as f64 / total as f64 >= self.healthy_ratio
    }

    /// Weighted blend: 70% in-window success ratio, 30% normalized inverse
    /// mean latency over the (longer) latency window, clamped to [0, 1].
    pub fn score(&self, history: &HealthHistory, now: DateTime<Utc>) -> f64 {
        if history.is_empty() {
            return 1.0;
        }
        let (total, successes) = self.window_counts(history, now, self.health_window);
        if total == 0 {
            return 0.0;
        }
        let success_rate = successes as f64 / total as f64;

        let latencies: Vec<Duration> = history
            .iter()
            .filter(|result| within(result, now, self.latency_window))
            .map(|result| result.latency)
            .collect();
        let latency_factor = if latencies.is_empty() {
            0.0
        } else {
            let mean_secs = latencies.iter().map(Duration::as_secs_f64).sum::<f64>()
                / latencies.len() as f64;
            (1.0 - mean_secs / LATENCY_NORM.as_secs_f64()).max(0.0)
        };

        (SUCCESS_WEIGHT * success_rate + LATENCY_WEIGHT * latency_factor).clamp(0.0, 1.0)
    }

    fn window_counts(
        &self,
        history: &HealthHistory,
        now: DateTime<Utc>,
        window: Duration,
    ) -> (usize, usize) {
        let mut total = 0usize;
        let mut successes = 0usize;
        for result in history.iter() {
            if within(result, now, window) {
                total += 1;
                if result.status.is_healthy() {
                    successes += 1;
                }
            }
        }
        (total, successes)
    }
}

/// Count of trailing non-healthy results, newest first, stopping at the
/// first healthy result.
pub fn consecutive_failures(history: &HealthHistory) -> u32 {
    let mut failures = 0u32;
    for result in history.iter_newest_first() {
        if result.status.is_healthy() {
            break;
        }
        failures += 1;
    }
    failures
}

fn within(result: &HealthCheckResult, now: DateTime<Utc>, window: Duration) -> bool {
    // A future-dated result (clock skew) stays in-window: to_std fails on
    // negative ages.
    now.signed_duration_since(result.timestamp)
        .to_std()
        .map(|age| age < window)
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use helmsman_common::config::CheckKind;

    fn tracker() -> HealthTracker {
        HealthTracker::new(&MonitorConfig::default())
    }

    fn healthy_at(now: DateTime<Utc>, age_secs: i64, latency: Duration) -> HealthCheckResult {
        HealthCheckResult::healthy("n", CheckKind::Heartbeat, latency)
            .at(now - ChronoDuration::seconds(age_secs))
    }

    fn unhealthy_at(now: DateTime<Utc>, age_secs: i64) -> HealthCheckResult {
        HealthCheckResult::unhealthy(
            "n",
            CheckKind::Heartbeat,
            Duration::from_millis(10),
            "down",
        )
        .at(now - ChronoDuration::seconds(age_secs))
    }

    #[test]
    fn empty_history_is_healthy_with_full_score() {
        let history = HealthHistory::new(100);
        let now = Utc::now();
        let verdict = tracker().verdict(&history, now);
        assert!(verdict.healthy);
        assert_eq!(verdict.score, 1.0);
        assert_eq!(verdict.consecutive_failures, 0);
    }

    #[test]
    fn stale_history_is_unhealthy_and_scores_zero() {
        let mut history = HealthHistory::new(100);
        let now = Utc::now();
        history.push(healthy_at(now, 600, Duration::from_millis(10)));
        let verdict = tracker().verdict(&history, now);
        assert!(!verdict.healthy);
        assert_eq!(verdict.score, 0.0);
    }

    #[test]
    fn eighty_percent_rule_is_a_closed_boundary() {
        let now = Utc::now();
        let tracker = tracker();

        // 4 of 5 in-window successes: exactly 80%, healthy.
        let mut history = HealthHistory::new(100);
        for i in 0..4 {
            history.push(healthy_at(now, i, Duration::from_millis(10)));
        }
        history.push(unhealthy_at(now, 5));
        assert!(tracker.is_healthy(&history, now));

        // 3 of 5: below the threshold.
        let mut history = HealthHistory::new(100);
        for i in 0..3 {
            history.push(healthy_at(now, i, Duration::from_millis(10)));
        }
        history.push(unhealthy_at(now, 4));
        history.push(unhealthy_at(now, 5));
        assert!(!tracker.is_healthy(&history, now));
    }

    #[test]
    fn results_outside_the_window_are_ignored() {
        let now = Utc::now();
        let mut history = HealthHistory::new(100);
        // Ten ancient failures, two fresh successes.
        for _ in 0..10 {
            history.push(unhealthy_at(now, 3_600));
        }
        history.push(healthy_at(now, 2, Duration::from_millis(10)));
        history.push(healthy_at(now, 1, Duration::from_millis(10)));
        assert!(tracker().is_healthy(&history, now));
    }

    #[test]
    fn score_blends_success_and_latency() {
        let now = Utc::now();
        let tracker = tracker();

        // All healthy at negligible latency: perfect score.
        let mut history = HealthHistory::new(100);
        for i in 0..5 {
            history.push(healthy_at(now, i, Duration::from_millis(0)));
        }
        assert!((tracker.score(&history, now) - 1.0).abs() < 1e-9);

        // All healthy but latency pinned at the 5s ceiling: latency term is
        // zero, leaving exactly the success weight.
        let mut history = HealthHistory::new(100);
        for i in 0..5 {
            history.push(healthy_at(now, i, Duration::from_secs(5)));
        }
        assert!((tracker.score(&history, now) - SUCCESS_WEIGHT).abs() < 1e-9);
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let now = Utc::now();
        let tracker = tracker();
        let mut history = HealthHistory::new(100);
        for i in 0..50 {
            if i % 3 == 0 {
                history.push(unhealthy_at(now, i));
            } else {
                history.push(healthy_at(now, i, Duration::from_secs(9)));
            }
        }
        let score = tracker.score(&history, now);
        assert!((0.0..=1.0).contains(&score), "score {} out of range", score);
    }

    #[test]
    fn consecutive_failures_stop_at_first_healthy() {
        let now = Utc::now();
        let mut history = HealthHistory::new(100);
        history.push(unhealthy_at(now, 9));
        history.push(healthy_at(now, 8, Duration::from_millis(10)));
        history.push(unhealthy_at(now, 3));
        history.push(unhealthy_at(now, 2));
        history.push(unhealthy_at(now, 1));
        assert_eq!(consecutive_failures(&history), 3);

        let mut all_healthy = HealthHistory::new(100);
        all_healthy.push(healthy_at(now, 1, Duration::from_millis(10)));
        assert_eq!(consecutive_failures(&all_healthy), 0);
    }
}
