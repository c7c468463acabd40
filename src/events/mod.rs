//! Conference lifecycle events and the observer registry that fans them out.
//!
//! Events arrive from the conferencing SDK (or, in the CLI, from stdin as
//! JSON lines). Every observer receives every event and filters by
//! conference ID itself.

pub mod bus;

pub use bus::{EventBus, Subscription};

use serde::{Deserialize, Serialize};

/// Conference state as reported by `ConferenceStatusUpdated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConferenceStatus {
    Default,
    Creating,
    Created,
    Joining,
    Joined,
    Leaving,
    Left,
    Ended,
    Destroyed,
    Error,
}

/// A conference lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConferenceEvent {
    /// The conference was torn down server side.
    ConferenceDestroyed { conference_id: String },
    /// The conference ended for every participant.
    ConferenceEnded { conference_id: String },
    /// Local conference state changed.
    ConferenceStatusUpdated {
        conference_id: String,
        state: ConferenceStatus,
    },
    ConferencePreJoined { conference_id: String },
    ConferenceJoined { conference_id: String },
    ConferenceJoinFailed { conference_id: String },
}

impl ConferenceEvent {
    /// Conference the event refers to.
    pub fn conference_id(&self) -> &str {
        match self {
            ConferenceEvent::ConferenceDestroyed { conference_id }
            | ConferenceEvent::ConferenceEnded { conference_id }
            | ConferenceEvent::ConferenceStatusUpdated { conference_id, .. }
            | ConferenceEvent::ConferencePreJoined { conference_id }
            | ConferenceEvent::ConferenceJoined { conference_id }
            | ConferenceEvent::ConferenceJoinFailed { conference_id } => conference_id,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ConferenceEvent::ConferenceDestroyed { .. } => "conference_destroyed",
            ConferenceEvent::ConferenceEnded { .. } => "conference_ended",
            ConferenceEvent::ConferenceStatusUpdated { .. } => "conference_status_updated",
            ConferenceEvent::ConferencePreJoined { .. } => "conference_pre_joined",
            ConferenceEvent::ConferenceJoined { .. } => "conference_joined",
            ConferenceEvent::ConferenceJoinFailed { .. } => "conference_join_failed",
        }
    }
}

/// Parse one JSON event line, e.g.
/// `{"type":"conference_ended","conference_id":"abc"}`.
pub fn parse_event(line: &str) -> Option<ConferenceEvent> {
    serde_json::from_str(line.trim()).ok()
}
