//! SMS notification dispatcher for journey transitions.
//!
//! No external provider is wired in: messages are recorded in memory as
//! `Queued` and logged, which is what the engine's fire-and-forget contract
//! needs.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use journey_core::config::SmsConfig;
use journey_core::notify::NotificationDispatcher;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsStatus {
    Queued,
    Rejected,
}

/// An outbound SMS addressed to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsMessage {
    pub id: Uuid,
    pub user_id: String,
    pub from: String,
    pub body: String,
    pub status: SmsStatus,
    pub segments: u32,
    pub created_at: DateTime<Utc>,
}

pub struct SmsNotifier {
    config: SmsConfig,
    messages: DashMap<Uuid, SmsMessage>,
    /// Insertion order of `messages`, oldest first.
    order: Mutex<VecDeque<Uuid>>,
}

impl SmsNotifier {
    pub fn new(config: SmsConfig) -> Self {
        tracing::info!(
            from = %config.from_number,
            enabled = config.enabled,
            "SMS notifier initialized"
        );
        Self {
            config,
            messages: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    /// Records an SMS for `user_id`. Rejected when SMS is disabled.
    pub fn send_sms(&self, user_id: &str, body: &str) -> SmsMessage {
        let status = if self.config.enabled {
            SmsStatus::Queued
        } else {
            SmsStatus::Rejected
        };
        let msg = SmsMessage {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            from: self.config.from_number.clone(),
            body: body.to_string(),
            status,
            segments: Self::calculate_segments(body),
            created_at: Utc::now(),
        };

        match msg.status {
            SmsStatus::Queued => {
                tracing::info!(
                    id = %msg.id,
                    user_id = %user_id,
                    segments = msg.segments,
                    "SMS message queued"
                );
                metrics::counter!("sms.messages_sent").increment(1);
            }
            SmsStatus::Rejected => {
                tracing::warn!(user_id = %user_id, "SMS disabled, message rejected");
                metrics::counter!("sms.messages_rejected").increment(1);
            }
        }

        self.store(msg.clone());
        msg
    }

    /// Records `msg`, evicting the oldest messages past the configured cap.
    fn store(&self, msg: SmsMessage) {
        let cap = self.config.max_stored_messages.max(1);
        let mut order = self.order.lock();
        order.push_back(msg.id);
        self.messages.insert(msg.id, msg);
        while order.len() > cap {
            if let Some(oldest) = order.pop_front() {
                self.messages.remove(&oldest);
                metrics::counter!("sms.messages_evicted").increment(1);
            }
        }
    }

    pub fn get_message(&self, id: Uuid) -> Option<SmsMessage> {
        self.messages.get(&id).map(|m| m.clone())
    }

    /// All messages sent to `user_id`, oldest first.
    pub fn messages_for(&self, user_id: &str) -> Vec<SmsMessage> {
        let mut messages: Vec<SmsMessage> = self
            .messages
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// GSM-style segment count: 160 chars for one segment, 153 per segment
    /// after that; 70/67 once the body leaves ASCII.
    pub fn calculate_segments(body: &str) -> u32 {
        let chars = body.chars().count() as u32;
        let (single, multi) = if body.is_ascii() { (160, 153) } else { (70, 67) };
        if chars <= single {
            1
        } else {
            chars.div_ceil(multi)
        }
    }
}

impl NotificationDispatcher for SmsNotifier {
    fn send(&self, user_id: &str, message: &str) -> bool {
        self.send_sms(user_id, message).status == SmsStatus::Queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(enabled: bool) -> SmsNotifier {
        SmsNotifier::new(SmsConfig {
            enabled,
            from_number: "+15550001111".to_string(),
            ..SmsConfig::default()
        })
    }

    #[test]
    fn test_send_records_message() {
        let sms = notifier(true);
        assert!(sms.send("user1", "You have reached \"Checkout\""));
        let messages = sms.messages_for("user1");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from, "+15550001111");
        assert_eq!(messages[0].status, SmsStatus::Queued);
        assert!(sms.get_message(messages[0].id).is_some());
        assert!(sms.messages_for("user2").is_empty());
    }

    #[test]
    fn test_disabled_rejects() {
        let sms = notifier(false);
        assert!(!sms.send("user1", "hi"));
        assert_eq!(sms.message_count(), 1);
        assert_eq!(sms.messages_for("user1")[0].status, SmsStatus::Rejected);
    }

    #[test]
    fn test_store_evicts_oldest_past_cap() {
        let sms = SmsNotifier::new(SmsConfig {
            max_stored_messages: 2,
            ..SmsConfig::default()
        });
        let first = sms.send_sms("user1", "one");
        sms.send_sms("user1", "two");
        sms.send_sms("user2", "three");

        assert_eq!(sms.message_count(), 2);
        assert!(sms.get_message(first.id).is_none());
        let bodies: Vec<String> = sms.messages_for("user1").into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, vec!["two"]);
        assert_eq!(sms.messages_for("user2").len(), 1);
    }

    #[test]
    fn test_segments() {
        assert_eq!(SmsNotifier::calculate_segments(""), 1);
        assert_eq!(SmsNotifier::calculate_segments(&"a".repeat(160)), 1);
        assert_eq!(SmsNotifier::calculate_segments(&"a".repeat(161)), 2);
        assert_eq!(SmsNotifier::calculate_segments(&"é".repeat(71)), 2);
    }
}
