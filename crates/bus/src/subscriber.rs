//! Event subscriber trait for async message handling

use crate::error::BusError;
use crate::message::Message;
use async_trait::async_trait;
use ekyc_events::{decode, Envelope};
use std::sync::Mutex;

/// Trait for event subscribers
///
/// Returning `Ok(())` acknowledges the message. Any error leaves it
/// unacknowledged so the bus redelivers it; because of that, handlers must
/// tolerate seeing the same message more than once.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Get the subscriber name (for logging)
    fn name(&self) -> &str;

    /// Handle one delivery
    async fn handle(&self, message: &Message) -> Result<(), BusError>;
}

/// Subscriber that decodes and keeps every envelope it receives
#[derive(Default)]
pub struct CollectingSubscriber {
    received: Mutex<Vec<Envelope>>,
}

impl CollectingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the envelopes received so far
    pub fn envelopes(&self) -> Vec<Envelope> {
        match self.received.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.envelopes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventSubscriber for CollectingSubscriber {
    fn name(&self) -> &str {
        "collector"
    }

    async fn handle(&self, message: &Message) -> Result<(), BusError> {
        let envelope = decode(&message.payload)?;
        match self.received.lock() {
            Ok(mut guard) => guard.push(envelope),
            Err(poisoned) => poisoned.into_inner().push(envelope),
        }
        Ok(())
    }
}
