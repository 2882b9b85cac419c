//! eKYC Event Bus - queue-group pub/sub
//!
//! Messages are delivered at-least-once. Within a queue group each message
//! goes to exactly one member; every group subscribed to a subject receives
//! its own copy. A handler returning `Ok` acknowledges the message, an error
//! leaves it unacknowledged and it is redelivered.
//!
//! Subscribers must be idempotent.

pub mod error;
pub mod memory;
pub mod message;
pub mod subscriber;

pub use error::BusError;
pub use memory::{DeliveryPolicy, InMemoryBus};
pub use message::{publish_envelope, EventBus, Message};
pub use subscriber::{CollectingSubscriber, EventSubscriber};
