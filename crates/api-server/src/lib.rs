#![warn(clippy::unwrap_used)]

pub mod definition;
pub mod facade;
pub mod rest;
pub mod server;

pub use definition::{ConnectionDefinition, JourneyDefinition, StageDefinition};
pub use facade::{ErrorResponse, JourneyApi};
pub use server::ApiServer;
