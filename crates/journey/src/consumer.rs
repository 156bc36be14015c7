//! Event consumer: drains an ingest receiver into the engine.

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use journey_core::types::UserEvent;

use crate::engine::JourneyEngine;

/// Evaluates every event received until the channel closes. Returns the
/// number of events processed.
///
/// Evaluation failures are logged and do not stop the loop.
pub async fn run_event_consumer(engine: JourneyEngine, mut receiver: mpsc::Receiver<UserEvent>) -> u64 {
    let mut processed = 0u64;

    while let Some(event) = receiver.recv().await {
        processed += 1;
        let event_name = event.event_name().unwrap_or("unknown");
        debug!(
            event_id = %event.event_id,
            user_id = %event.user_id,
            event = %event_name,
            "Processing event"
        );

        match engine.evaluate(&event.user_id, &event.payload) {
            Ok(results) if results.is_empty() => {
                debug!(user_id = %event.user_id, "No journey progressions for this event");
            }
            Ok(results) => {
                for result in &results {
                    info!(
                        user_id = %event.user_id,
                        journey_id = %result.journey_id,
                        action = result.action.as_str(),
                        stage_id = %result.stage_id,
                        "User progressed in journey"
                    );
                }
            }
            Err(e) => {
                error!(
                    event_id = %event.event_id,
                    user_id = %event.user_id,
                    error = %e,
                    "Event evaluation failed"
                );
            }
        }
    }

    info!(processed, "Event consumer stopped");
    processed
}
