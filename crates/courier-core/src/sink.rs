//! Status reporting port and the bundled sinks.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::EventId;

/// Per-event outcome transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EventStatus {
    /// Handler succeeded.
    Sent,

    /// Attempt `attempt` of `max` retries is scheduled.
    Retrying { attempt: u32, max: u32 },

    /// Retries exhausted.
    Failed,
}

impl EventStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Sent | EventStatus::Failed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Sent => f.write_str("Sent"),
            EventStatus::Retrying { attempt, max } => write!(f, "Retrying ({attempt}/{max})"),
            EventStatus::Failed => f.write_str("Failed"),
        }
    }
}

/// Observer of status transitions. Fire-and-forget: the worker does not
/// wait for or inspect anything the sink does.
///
/// Calls for one event arrive in the order the transitions happened.
pub trait StatusSink: Send + Sync {
    fn report(&self, id: &EventId, status: &EventStatus);
}

/// Drops every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatusSink;

impl StatusSink for NoopStatusSink {
    fn report(&self, _id: &EventId, _status: &EventStatus) {}
}

/// One recorded transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub status: EventStatus,
    pub at: DateTime<Utc>,
}

/// Latest status per event, in the `{"statusList": {...}}` shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(rename = "statusList")]
    pub status_list: BTreeMap<String, String>,
}

/// Keeps every transition in memory, keyed by event id.
#[derive(Debug, Default)]
pub struct MemoryStatusSink {
    records: Mutex<HashMap<EventId, Vec<StatusRecord>>>,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, id: &EventId) -> Option<EventStatus> {
        self.lock()
            .get(id)
            .and_then(|history| history.last())
            .map(|record| record.status)
    }

    pub fn history(&self, id: &EventId) -> Vec<EventStatus> {
        self.lock()
            .get(id)
            .map(|history| history.iter().map(|record| record.status).collect())
            .unwrap_or_default()
    }

    pub fn records(&self, id: &EventId) -> Vec<StatusRecord> {
        self.lock().get(id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let status_list = self
            .lock()
            .iter()
            .filter_map(|(id, history)| {
                history
                    .last()
                    .map(|record| (id.to_string(), record.status.to_string()))
            })
            .collect();
        StatusSnapshot { status_list }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventId, Vec<StatusRecord>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StatusSink for MemoryStatusSink {
    fn report(&self, id: &EventId, status: &EventStatus) {
        let record = StatusRecord {
            status: *status,
            at: Utc::now(),
        };
        self.lock().entry(id.clone()).or_default().push(record);
    }
}
