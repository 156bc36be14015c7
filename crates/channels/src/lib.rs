//! Journey collaborators: inbound event queue and outbound SMS notifications.

pub mod ingest;
pub mod sms;

pub use ingest::{ConsumerHandle, EventQueue};
pub use sms::SmsNotifier;
