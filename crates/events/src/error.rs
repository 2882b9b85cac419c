//! Envelope codec errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Payload for {event_type} is malformed: {reason}")]
    MalformedPayload { event_type: String, reason: String },
}
