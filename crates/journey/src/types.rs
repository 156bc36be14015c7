use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a user in a journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionAction {
    Onboarded,
    Moved,
}

impl TransitionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onboarded => "ONBOARDED",
            Self::Moved => "MOVED",
        }
    }
}

/// One entry of a user's append-only journey history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub stage_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: TransitionAction,
}

/// Progress of one user through one journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserJourneyState {
    pub user_id: String,
    pub journey_id: String,
    pub current_stage_id: String,
    pub onboarded_at: DateTime<Utc>,
    pub completed_stage_ids: BTreeSet<String>,
    pub history: Vec<HistoryEntry>,
}

impl UserJourneyState {
    /// Fresh state positioned at the onboarding stage.
    pub fn new(
        user_id: impl Into<String>,
        journey_id: impl Into<String>,
        onboarding_stage_id: impl Into<String>,
        onboarded_at: DateTime<Utc>,
    ) -> Self {
        let stage_id = onboarding_stage_id.into();
        Self {
            user_id: user_id.into(),
            journey_id: journey_id.into(),
            current_stage_id: stage_id.clone(),
            onboarded_at,
            completed_stage_ids: BTreeSet::new(),
            history: vec![HistoryEntry {
                stage_id,
                timestamp: onboarded_at,
                action: TransitionAction::Onboarded,
            }],
        }
    }

    /// Marks the current stage completed and moves to `stage_id`.
    pub fn move_to_stage(&mut self, stage_id: impl Into<String>, at: DateTime<Utc>) {
        let stage_id = stage_id.into();
        let previous = std::mem::replace(&mut self.current_stage_id, stage_id.clone());
        self.completed_stage_ids.insert(previous);
        self.history.push(HistoryEntry {
            stage_id,
            timestamp: at,
            action: TransitionAction::Moved,
        });
    }

    pub fn has_completed_stage(&self, stage_id: &str) -> bool {
        self.completed_stage_ids.contains(stage_id)
    }
}

/// A transition produced by one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub journey_id: String,
    pub action: TransitionAction,
    pub stage_id: String,
}

/// An activation flip applied by the time-window sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationChange {
    pub journey_id: String,
    pub active: bool,
}

/// Listing view of a journey, without its graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneySummary {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub is_time_bound: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_recurring: bool,
}

/// A user currently tracked in a journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyMember {
    pub user_id: String,
    pub current_stage_id: String,
    pub onboarded_at: DateTime<Utc>,
}

/// A journey the user is tracked in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserJourneySummary {
    pub journey_id: String,
    pub journey_name: String,
    pub current_stage_id: String,
    pub onboarded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_state_records_onboarding() {
        let now = Utc::now();
        let state = UserJourneyState::new("user1", "j1", "s1", now);
        assert_eq!(state.current_stage_id, "s1");
        assert!(state.completed_stage_ids.is_empty());
        assert_eq!(
            state.history,
            vec![HistoryEntry {
                stage_id: "s1".into(),
                timestamp: now,
                action: TransitionAction::Onboarded,
            }]
        );
    }

    #[test]
    fn test_move_to_stage_completes_previous() {
        let now = Utc::now();
        let mut state = UserJourneyState::new("user1", "j1", "s1", now);
        state.move_to_stage("s2", now + Duration::seconds(5));
        state.move_to_stage("s3", now + Duration::seconds(9));

        assert_eq!(state.current_stage_id, "s3");
        assert!(state.has_completed_stage("s1"));
        assert!(state.has_completed_stage("s2"));
        assert!(!state.has_completed_stage("s3"));
        assert_eq!(state.history.len(), 3);
        assert_eq!(state.history[2].action, TransitionAction::Moved);
        assert_eq!(state.onboarded_at, now);
    }

    #[test]
    fn test_action_wire_format() {
        assert_eq!(
            serde_json::to_value(TransitionAction::Onboarded).unwrap(),
            serde_json::json!("ONBOARDED")
        );
        assert_eq!(TransitionAction::Moved.as_str(), "MOVED");
    }
}
