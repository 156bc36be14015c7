//! Demo event replay for the seeded journeys.

use std::sync::Arc;
use std::time::Duration;

use journey_channels::EventQueue;
use journey_core::types::UserEvent;
use serde_json::{json, Value};
use tracing::info;

/// `(delay from start in ms, user, payload)`, sorted by delay.
fn script() -> Vec<(u64, &'static str, Value)> {
    vec![
        (1000, "user1", json!({"event": "login"})),
        (1500, "user2", json!({"event": "login"})),
        (2000, "user3", json!({"event": "login"})),
        (3000, "user1", json!({"event": "page_view", "details": {"page": "recharge"}})),
        (4000, "user2", json!({"event": "page_view", "details": {"page": "recharge"}})),
        (5000, "user3", json!({"event": "account_open", "details": {"type": "upi_lite"}})),
        (6000, "user2", json!({"event": "transaction", "details": {"type": "recharge", "amount": 100}})),
    ]
}

/// Publishes the demo script on `queue`, honouring the scripted delays.
pub async fn replay_demo_events(queue: Arc<EventQueue>) {
    let mut elapsed = 0;
    for (at_ms, user_id, payload) in script() {
        tokio::time::sleep(Duration::from_millis(at_ms - elapsed)).await;
        elapsed = at_ms;
        let delivered = queue.publish(UserEvent::new(user_id, payload));
        info!(user_id, delivered, "Published demo event");
    }
    info!("Demo event replay finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_is_ordered() {
        let delays: Vec<u64> = script().iter().map(|(at, _, _)| *at).collect();
        let mut sorted = delays.clone();
        sorted.sort_unstable();
        assert_eq!(delays, sorted);
    }

    #[test]
    fn test_script_timing() {
        let timing: Vec<(u64, &str, Option<String>)> = script()
            .into_iter()
            .map(|(at, user, payload)| {
                (at, user, payload["event"].as_str().map(str::to_string))
            })
            .collect();
        assert_eq!(timing[3], (3000, "user1", Some("page_view".to_string())));
        assert_eq!(timing[4], (4000, "user2", Some("page_view".to_string())));
        assert_eq!(timing[6], (6000, "user2", Some("transaction".to_string())));
        assert_eq!(timing.len(), 7);
    }

    #[tokio::test]
    async fn test_replay_reaches_consumer() {
        let queue = Arc::new(EventQueue::new(16));
        let (_handle, mut rx) = queue.register_consumer();

        replay_demo_events(queue.clone()).await;

        let mut users = Vec::new();
        while let Ok(event) = rx.try_recv() {
            users.push(event.user_id);
        }
        assert_eq!(users.len(), script().len());
        assert_eq!(users[0], "user1");
    }
}
