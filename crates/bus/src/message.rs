//! Raw bus messages and the publish/subscribe seam

use crate::error::BusError;
use crate::subscriber::EventSubscriber;
use async_trait::async_trait;
use ekyc_events::{encode, subject::dlq_subject, Envelope};
use std::sync::Arc;

/// A message as seen by a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub payload: Vec<u8>,
    /// 1 on first delivery, incremented on every redelivery
    pub attempt: u32,
}

impl Message {
    pub fn new(subject: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            subject: subject.into(),
            payload,
            attempt: 1,
        }
    }

    pub fn is_redelivery(&self) -> bool {
        self.attempt > 1
    }
}

/// Publish/subscribe transport
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish raw bytes on a subject
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Join `group` on `subject`. Members of one group compete for messages.
    async fn subscribe(
        &self,
        subject: &str,
        group: &str,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> Result<(), BusError>;
}

/// Encode and publish an envelope on its own subject.
///
/// Error-signalling event types are also copied to `<subject>.dlq`. The copy
/// is advisory: a failure to publish it is logged and otherwise ignored.
pub async fn publish_envelope(bus: &dyn EventBus, envelope: &Envelope) -> Result<(), BusError> {
    let subject = envelope.subject();
    let payload = encode(envelope)?;

    bus.publish(subject.as_str(), payload.clone()).await?;

    tracing::debug!(
        subject = subject.as_str(),
        event_id = envelope.event_id(),
        correlation_id = envelope.correlation_id(),
        session_id = envelope.session_id(),
        "Published event"
    );

    if subject.is_error() {
        let dlq = dlq_subject(subject.as_str());
        if let Err(e) = bus.publish(&dlq, payload).await {
            tracing::warn!(
                subject = %dlq,
                event_id = envelope.event_id(),
                error = %e,
                "Dead-letter copy failed"
            );
        }
    }

    Ok(())
}
