use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Analytics event emitted on journey transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub journey_id: String,
    pub user_id: String,
    pub stage_id: String,
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    JourneyEntered,
    JourneyStepCompleted,
    JourneyCompleted,
}

/// A behavioral event delivered by the ingest queue.
///
/// `payload` is opaque to the transport. By convention it carries an `event`
/// string and a free-form `details` object; stage conditions dereference it
/// defensively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEvent {
    pub event_id: Uuid,
    pub user_id: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl UserEvent {
    pub fn new(user_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            user_id: user_id.into(),
            payload,
            published_at: Utc::now(),
        }
    }

    /// The `event` name carried by the payload, if any.
    pub fn event_name(&self) -> Option<&str> {
        self.payload.get("event").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name() {
        let ev = UserEvent::new("user1", serde_json::json!({"event": "login"}));
        assert_eq!(ev.event_name(), Some("login"));

        let bare = UserEvent::new("user1", serde_json::json!({"details": {}}));
        assert_eq!(bare.event_name(), None);
    }
}
