//! Payload of `frigate/events`.
//!
//! Frigate publishes one message per tracked-object state change. Only the
//! fields the sorter reads are modelled; everything else is ignored.

use serde::{Deserialize, Serialize};

/// Lifecycle stage of a tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    New,
    Update,
    End,
}

/// Snapshot of a tracked object at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    /// Frigate event id, e.g. `1607123955.475377-mxklsc`.
    pub id: String,
    pub camera: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_score: Option<f64>,
    /// Unix timestamp (seconds, fractional).
    pub start_time: f64,
    /// Unix timestamp; `None` while the object is still tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub has_clip: bool,
    #[serde(default)]
    pub has_snapshot: bool,
    #[serde(default)]
    pub entered_zones: Vec<String>,
}

/// Envelope published on `frigate/events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrigateEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub before: TrackedObject,
    pub after: TrackedObject,
}

impl FrigateEvent {
    /// Parse a raw `frigate/events` payload.
    pub fn from_payload(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }

    /// Event id (stable across the object's lifetime).
    pub fn id(&self) -> &str {
        &self.after.id
    }

    /// Duration in seconds, once the event has ended.
    pub fn duration_secs(&self) -> Option<f64> {
        self.after.end_time.map(|end| end - self.after.start_time)
    }
}
