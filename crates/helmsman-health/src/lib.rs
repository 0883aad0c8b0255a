//! ---
//! hm_section: "03-health-monitoring"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Health probing and scoring."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
//! Pluggable health probes and the rolling scoring rules that turn probe
//! results into per-node health verdicts.

pub mod probe;
pub mod scripted;
pub mod simulated;
pub mod tracker;

pub use probe::HealthProbe;
pub use scripted::{ProbeOutcome, ScriptedProbe};
pub use simulated::SimulatedProbe;
pub use tracker::{consecutive_failures, HealthTracker};
