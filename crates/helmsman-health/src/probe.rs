//! ---
//! hm_section: "03-health-monitoring"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Pluggable health probe interface."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use async_trait::async_trait;
use helmsman_cluster::{HealthCheckResult, NodeSnapshot};
use helmsman_common::config::CheckKind;

/// Executes one health check against one node.
///
/// Implementations never fail at the type level: timeouts, connection
/// errors, and internal faults are captured into the returned result as an
/// unhealthy/error status with the message attached. Latency covers the full
/// call, start to return, even on failure.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, node: &NodeSnapshot, kind: CheckKind) -> HealthCheckResult;
}
