use serde::Serialize;
use serde_json::Value;

use crate::condition::Condition;

/// A node in a journey graph.
#[derive(Debug, Clone, Serialize)]
pub struct Stage {
    pub id: String,
    pub name: String,
    pub condition: Condition,
    pub is_onboarding: bool,
    pub is_terminal: bool,
    /// Send a notification to the user when they enter this stage.
    pub notify_on_transition: bool,
    next_stage_ids: Vec<String>,
}

impl Stage {
    /// Creates an intermediate stage with no outgoing edges.
    pub fn new(id: impl Into<String>, name: impl Into<String>, condition: Condition) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            condition,
            is_onboarding: false,
            is_terminal: false,
            notify_on_transition: false,
            next_stage_ids: Vec::new(),
        }
    }

    pub fn onboarding(mut self) -> Self {
        self.is_onboarding = true;
        self
    }

    pub fn terminal(mut self) -> Self {
        self.is_terminal = true;
        self
    }

    pub fn notify_on_transition(mut self, notify: bool) -> Self {
        self.notify_on_transition = notify;
        self
    }

    /// Outgoing edges in insertion order, which is also evaluation priority.
    pub fn next_stage_ids(&self) -> &[String] {
        &self.next_stage_ids
    }

    pub fn has_next_stage(&self, stage_id: &str) -> bool {
        self.next_stage_ids.iter().any(|id| id == stage_id)
    }

    /// Adds an outgoing edge. Returns `false` when nothing was added: the
    /// edge already exists, or this stage is terminal (terminal stages never
    /// gain edges, and this is not treated as an error).
    pub fn add_next_stage(&mut self, stage_id: impl Into<String>) -> bool {
        let stage_id = stage_id.into();
        if self.is_terminal || self.has_next_stage(&stage_id) {
            return false;
        }
        self.next_stage_ids.push(stage_id);
        true
    }

    pub fn evaluate_condition(&self, payload: &Value) -> bool {
        self.condition.evaluate(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_next_stage_keeps_order_and_rejects_duplicates() {
        let mut stage = Stage::new("s1", "Login", Condition::event("login")).onboarding();
        assert!(stage.add_next_stage("s3"));
        assert!(stage.add_next_stage("s2"));
        assert!(!stage.add_next_stage("s3"));
        assert_eq!(stage.next_stage_ids(), ["s3".to_string(), "s2".to_string()]);
    }

    #[test]
    fn test_terminal_stage_never_gains_edges() {
        // Silently ignored rather than rejected.
        let mut stage = Stage::new("end", "Checkout", Condition::event("checkout")).terminal();
        assert!(!stage.add_next_stage("s1"));
        assert!(stage.next_stage_ids().is_empty());
    }

    #[test]
    fn test_evaluate_condition_on_malformed_payload() {
        let stage = Stage::new(
            "s2",
            "Recharge Page View",
            Condition::all(vec![
                Condition::event("page_view"),
                Condition::field_equals("details.page", "recharge"),
            ]),
        );
        assert!(!stage.evaluate_condition(&json!({"event": "page_view", "details": null})));
        assert!(!stage.evaluate_condition(&json!(["not", "an", "object"])));
        assert!(stage.evaluate_condition(&json!({"event": "page_view", "details": {"page": "recharge"}})));
    }
}
