//! Unified event bus: trait for emitting analytics events from the engine.
//!
//! The engine accepts an `Arc<dyn EventSink>` and reports every onboarding,
//! stage move and journey completion through it.

use crate::types::{AnalyticsEvent, EventType};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Trait for emitting analytics events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AnalyticsEvent);
}

/// No-op sink for tests and deployments without an analytics pipeline.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: AnalyticsEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("event bus mutex poisoned").len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event bus mutex poisoned").clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: AnalyticsEvent) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}

/// Convenience builder for a transition `AnalyticsEvent`.
pub fn make_event(
    event_type: EventType,
    node_id: impl Into<String>,
    journey_id: impl Into<String>,
    user_id: impl Into<String>,
    stage_id: impl Into<String>,
    timestamp: DateTime<Utc>,
) -> AnalyticsEvent {
    AnalyticsEvent {
        event_id: Uuid::new_v4(),
        event_type,
        journey_id: journey_id.into(),
        user_id: user_id.into(),
        stage_id: stage_id.into(),
        node_id: node_id.into(),
        timestamp,
    }
}

/// Convenience: create a no-op sink.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
