//! ---
//! hm_section: "02-cluster-model"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Cluster data model, failover events, and the node registry."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
//! Cluster membership model for Helmsman: node records with bounded health
//! history, the append-only failover event log, and the mutex-guarded
//! registry that owns all of it.

pub mod error;
pub mod event;
pub mod node;
pub mod registry;

pub use error::RegistryError;
pub use event::{
    EventLog, FailoverEvent, FailoverEventStatus, FailoverTrigger, STRATEGY_ACTIVE_PASSIVE,
};
pub use node::{
    HealthCheckResult, HealthHistory, HealthVerdict, Node, NodeDescriptor, NodeSnapshot, NodeState,
    ProbeStatus,
};
pub use registry::{NodeRegistry, RemovedNode};
