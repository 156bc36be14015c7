//! In-process event queue: fans published user events out to registered
//! consumers over bounded channels.
//!
//! Delivery is best effort. A consumer whose buffer is full misses the event;
//! a consumer whose receiver was dropped is pruned on the next publish.

use indexmap::IndexMap;
use journey_core::types::UserEvent;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stable identifier of a registered consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumerHandle(Uuid);

impl std::fmt::Display for ConsumerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct EventQueue {
    capacity: usize,
    consumers: Mutex<IndexMap<ConsumerHandle, mpsc::Sender<UserEvent>>>,
}

impl EventQueue {
    /// `capacity` is the per-consumer buffer size.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            consumers: Mutex::new(IndexMap::new()),
        }
    }

    /// Registers a consumer and returns its handle with the receiving end.
    pub fn register_consumer(&self) -> (ConsumerHandle, mpsc::Receiver<UserEvent>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let handle = ConsumerHandle(Uuid::new_v4());
        self.consumers.lock().insert(handle, tx);
        info!(consumer = %handle, "Event consumer registered");
        (handle, rx)
    }

    /// Removes a consumer. Its receiver sees the channel close once drained.
    pub fn deregister(&self, handle: ConsumerHandle) -> bool {
        let removed = self.consumers.lock().shift_remove(&handle).is_some();
        if removed {
            info!(consumer = %handle, "Event consumer deregistered");
        }
        removed
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.lock().len()
    }

    /// Delivers `event` to every consumer in registration order. Returns the
    /// number of consumers that accepted it.
    pub fn publish(&self, event: UserEvent) -> usize {
        debug!(
            event_id = %event.event_id,
            user_id = %event.user_id,
            event = event.event_name().unwrap_or("unknown"),
            "Publishing event"
        );

        let mut delivered = 0;
        let mut closed = Vec::new();
        let mut consumers = self.consumers.lock();

        for (handle, sender) in consumers.iter() {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(consumer = %handle, event_id = %event.event_id, "Consumer buffer full, event dropped");
                    metrics::counter!("ingest.events_dropped").increment(1);
                }
                Err(TrySendError::Closed(_)) => closed.push(*handle),
            }
        }
        for handle in closed {
            consumers.shift_remove(&handle);
            info!(consumer = %handle, "Pruned closed event consumer");
        }

        metrics::counter!("ingest.events_published").increment(1);
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fan_out_to_all_consumers() {
        let queue = EventQueue::new(4);
        let (_a, mut rx_a) = queue.register_consumer();
        let (_b, mut rx_b) = queue.register_consumer();

        let delivered = queue.publish(UserEvent::new("user1", json!({"event": "login"})));
        assert_eq!(delivered, 2);
        assert_eq!(rx_a.recv().await.unwrap().user_id, "user1");
        assert_eq!(rx_b.recv().await.unwrap().event_name(), Some("login"));
    }

    #[tokio::test]
    async fn test_deregister_closes_channel() {
        let queue = EventQueue::new(4);
        let (handle, mut rx) = queue.register_consumer();
        assert!(queue.deregister(handle));
        assert!(!queue.deregister(handle));
        assert_eq!(queue.publish(UserEvent::new("user1", json!({}))), 0);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_full_consumer_misses_events() {
        let queue = EventQueue::new(1);
        let (_handle, _rx) = queue.register_consumer();
        assert_eq!(queue.publish(UserEvent::new("user1", json!({"n": 1}))), 1);
        assert_eq!(queue.publish(UserEvent::new("user1", json!({"n": 2}))), 0);
        assert_eq!(queue.consumer_count(), 1);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let queue = EventQueue::new(4);
        let (_handle, rx) = queue.register_consumer();
        drop(rx);
        assert_eq!(queue.publish(UserEvent::new("user1", json!({}))), 0);
        assert_eq!(queue.consumer_count(), 0);
    }
}
