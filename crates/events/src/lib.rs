//! eKYC Events - envelope protocol
//!
//! Every message on the bus is an [`Envelope`]: trace/correlation metadata plus
//! a payload whose shape is determined by `metadata.event_type`.
//!
//! ```text
//! {"metadata": {event_id, correlation_id, session_id, occurred_at,
//!               event_type, source_service},
//!  "data": <payload>}
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod payload;
pub mod subject;

pub use codec::{decode, encode};
pub use envelope::{Envelope, EventMetadata};
pub use error::EventError;
pub use payload::{
    AdminDecisionEvent, AuditEvent, DecisionEvent, EventPayload, FaceResult, LivenessResult,
    OcrFields, OcrResult, VerificationRequest, WorkerFailure,
};
pub use subject::Subject;
