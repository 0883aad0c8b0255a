//! ---
//! hm_section: "02-cluster-model"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Typed registry failures."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use thiserror::Error;

use crate::node::NodeState;

/// Typed failure returned by mutating registry operations.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("node '{0}' is not registered")]
    UnknownNode(String),
    #[error("node '{0}' is already registered")]
    DuplicateNode(String),
    #[error("cannot {action} node '{node}' while it is {state}")]
    InvalidTransition {
        node: String,
        state: NodeState,
        action: &'static str,
    },
}
