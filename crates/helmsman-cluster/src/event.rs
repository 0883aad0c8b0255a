//! ---
//! hm_section: "02-cluster-model"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Failover event records and the append-only event log."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Strategy label carried on every failover event. Only active-passive
/// promotion is implemented.
pub const STRATEGY_ACTIVE_PASSIVE: &str = "active-passive";

/// Who initiated a failover transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailoverTrigger {
    Automatic,
    Manual,
    System,
}

impl FailoverTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverTrigger::Automatic => "automatic",
            FailoverTrigger::Manual => "manual",
            FailoverTrigger::System => "system",
        }
    }
}

/// Lifecycle status of a failover event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailoverEventStatus {
    InProgress,
    Completed,
    Failed,
}

impl FailoverEventStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FailoverEventStatus::InProgress)
    }
}

/// Immutable record of one failover transition. `new_primary` is absent when
/// a candidate search came up empty and the transition could not proceed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub previous_primary: Option<String>,
    pub new_primary: Option<String>,
    pub reason: String,
    pub strategy: String,
    pub triggered_by: FailoverTrigger,
    pub status: FailoverEventStatus,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
}

impl FailoverEvent {
    /// Start a new in-progress event for a transition to `new_primary`.
    pub fn begin(
        previous_primary: Option<String>,
        new_primary: Option<String>,
        reason: impl Into<String>,
        triggered_by: FailoverTrigger,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            previous_primary,
            new_primary,
            reason: reason.into(),
            strategy: STRATEGY_ACTIVE_PASSIVE.to_owned(),
            triggered_by,
            status: FailoverEventStatus::InProgress,
            completed_at: None,
            metadata: IndexMap::new(),
        }
    }
}

/// Append-only in-memory log of failover events. Events reaching a terminal
/// status are never mutated again except to set the completion timestamp.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<FailoverEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, returning its id.
    pub fn append(&self, event: FailoverEvent) -> Uuid {
        let id = event.id;
        self.events.lock().push(event);
        id
    }

    /// Mark an in-progress event completed. A terminal event only gains its
    /// completion timestamp if it was still missing.
    pub fn complete(&self, id: Uuid, at: DateTime<Utc>) {
        self.finish(id, FailoverEventStatus::Completed, at);
    }

    /// Mark an in-progress event failed.
    pub fn fail(&self, id: Uuid, at: DateTime<Utc>) {
        self.finish(id, FailoverEventStatus::Failed, at);
    }

    fn finish(&self, id: Uuid, status: FailoverEventStatus, at: DateTime<Utc>) {
        let mut events = self.events.lock();
        if let Some(event) = events.iter_mut().find(|e| e.id == id) {
            if event.status.is_terminal() {
                event.completed_at.get_or_insert(at);
                return;
            }
            event.status = status;
            event.completed_at = Some(at);
        }
    }

    pub fn get(&self, id: Uuid) -> Option<FailoverEvent> {
        self.events.lock().iter().find(|e| e.id == id).cloned()
    }

    /// The most recent `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<FailoverEvent> {
        let events = self.events.lock();
        let start = events.len().saturating_sub(limit);
        events[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
