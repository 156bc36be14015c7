//! User journey tracking: stage graphs, structural validation, and the
//! evaluation engine that moves users through journeys as events arrive.

pub mod condition;
pub mod consumer;
pub mod engine;
pub mod journey;
pub mod stage;
pub mod types;

pub use condition::{Condition, PredicateRegistry};
pub use consumer::run_event_consumer;
pub use engine::JourneyEngine;
pub use journey::Journey;
pub use stage::Stage;
