//! JSON wire codec
//!
//! `data` is decoded by looking `metadata.event_type` up in the subject
//! catalogue, so an envelope can never carry a payload of the wrong shape.

use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::envelope::{Envelope, EventMetadata};
use crate::error::EventError;
use crate::payload::EventPayload;
use crate::subject::Subject;

#[derive(Deserialize)]
struct RawEnvelope {
    metadata: EventMetadata,
    data: Value,
}

/// Serialize an envelope to bytes
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, EventError> {
    Ok(serde_json::to_vec(envelope)?)
}

/// Parse bytes into a typed envelope
pub fn decode(bytes: &[u8]) -> Result<Envelope, EventError> {
    let raw: RawEnvelope = serde_json::from_slice(bytes)?;

    let subject = Subject::from_str(&raw.metadata.event_type)
        .map_err(|_| EventError::UnknownEventType(raw.metadata.event_type.clone()))?;
    let data = EventPayload::from_value(subject, raw.data)?;

    Ok(Envelope {
        metadata: raw.metadata,
        data,
    })
}
