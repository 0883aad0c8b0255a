//! ---
//! hm_section: "04-failover-coordination"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Failover decision logic, coordinator state machine, and monitoring loop."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
//! The failover coordinator: consumes node descriptors and a pluggable
//! health probe, monitors the cluster on a fixed tick, and transfers the
//! primary role when the decider calls for it.

pub mod coordinator;
pub mod decider;
pub mod recovery;
pub mod status;

pub use coordinator::{
    CoordinatorHandle, FailoverCallback, FailoverCoordinator, RecoveryCallback,
};
pub use decider::{FailoverDecider, FailoverReason, PrimaryHealth};
pub use recovery::RecoveryWatcher;
pub use status::{ClusterState, ClusterStatus};
