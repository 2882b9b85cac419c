//! Event bus errors

use thiserror::Error;

/// Errors that can occur in the event bus
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Failed to publish to {subject}: {reason}")]
    PublishFailed { subject: String, reason: String },

    #[error("Subscriber '{name}' failed: {reason}")]
    SubscriberFailed { name: String, reason: String },

    #[error("Envelope error: {0}")]
    Envelope(#[from] ekyc_events::EventError),

    #[error("Bus is closed")]
    Closed,
}

impl BusError {
    pub fn subscriber(name: impl Into<String>, reason: impl ToString) -> Self {
        BusError::SubscriberFailed {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
