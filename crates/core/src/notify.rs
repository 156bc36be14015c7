//! Outbound notification seam.
//!
//! Transitions into a stage flagged `notify_on_transition` produce one
//! message per user. Delivery is fire-and-forget: the boolean result is only
//! logged by the caller.

use std::sync::{Arc, Mutex};

pub trait NotificationDispatcher: Send + Sync {
    fn send(&self, user_id: &str, message: &str) -> bool;
}

/// Dispatcher that drops every message.
pub struct NoOpNotifier;

impl NotificationDispatcher for NoOpNotifier {
    fn send(&self, _user_id: &str, _message: &str) -> bool {
        true
    }
}

/// A message recorded by [`CaptureNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub user_id: String,
    pub message: String,
}

/// In-memory dispatcher for tests. Can be told to report failure.
#[derive(Default)]
pub struct CaptureNotifier {
    sent: Mutex<Vec<SentNotification>>,
    fail: bool,
}

impl CaptureNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that records messages but reports every send as failed.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().expect("notifier mutex poisoned").len()
    }
}

impl NotificationDispatcher for CaptureNotifier {
    fn send(&self, user_id: &str, message: &str) -> bool {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(SentNotification {
                user_id: user_id.to_string(),
                message: message.to_string(),
            });
        !self.fail
    }
}

pub fn noop_notifier() -> Arc<dyn NotificationDispatcher> {
    Arc::new(NoOpNotifier)
}

pub fn capture_notifier() -> Arc<CaptureNotifier> {
    Arc::new(CaptureNotifier::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_notifier_records() {
        let notifier = capture_notifier();
        assert!(notifier.send("user1", "hello"));
        assert_eq!(notifier.count(), 1);
        assert_eq!(notifier.sent()[0].message, "hello");
    }

    #[test]
    fn test_failing_notifier_still_records() {
        let notifier = CaptureNotifier::failing();
        assert!(!notifier.send("user1", "hello"));
        assert_eq!(notifier.count(), 1);
    }
}
