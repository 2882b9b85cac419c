//! Event envelope - metadata-wrapped bus message

use chrono::{DateTime, Utc};
use ekyc_core::RequestContext;
use serde::{Deserialize, Serialize};

use crate::payload::EventPayload;
use crate::subject::Subject;

/// Trace and routing metadata carried by every message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Globally unique; consumers deduplicate on it
    pub event_id: String,
    pub correlation_id: String,
    pub session_id: String,
    pub occurred_at: DateTime<Utc>,
    /// Logical event type, equal to the subject name
    pub event_type: String,
    /// Identity of the publishing service
    pub source_service: String,
}

/// A message on the event bus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub metadata: EventMetadata,
    pub data: EventPayload,
}

impl Envelope {
    /// Wrap a payload with fresh metadata
    pub fn new(
        source_service: impl Into<String>,
        correlation_id: impl Into<String>,
        session_id: impl Into<String>,
        data: EventPayload,
    ) -> Self {
        let metadata = EventMetadata {
            event_id: uuid::Uuid::new_v4().to_string(),
            correlation_id: correlation_id.into(),
            session_id: session_id.into(),
            occurred_at: Utc::now(),
            event_type: data.subject().as_str().to_string(),
            source_service: source_service.into(),
        };

        Self { metadata, data }
    }

    /// Wrap a payload, taking correlation and session ids from a request context
    pub fn from_context(
        source_service: impl Into<String>,
        ctx: &RequestContext,
        data: EventPayload,
    ) -> Self {
        Self::new(
            source_service,
            ctx.correlation_id.clone(),
            ctx.session_field().to_string(),
            data,
        )
    }

    /// Override the generated event id (replays, tests)
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.metadata.event_id = event_id.into();
        self
    }

    /// Subject this envelope is published on
    pub fn subject(&self) -> Subject {
        self.data.subject()
    }

    pub fn event_id(&self) -> &str {
        &self.metadata.event_id
    }

    pub fn session_id(&self) -> &str {
        &self.metadata.session_id
    }

    pub fn correlation_id(&self) -> &str {
        &self.metadata.correlation_id
    }

    /// Request context for handling this envelope
    pub fn context(&self) -> RequestContext {
        RequestContext::new(self.metadata.source_service.clone())
            .with_correlation_id(self.metadata.correlation_id.clone())
            .with_session(self.metadata.session_id.clone())
    }
}
