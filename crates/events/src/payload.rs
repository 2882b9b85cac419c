//! Typed event payloads
//!
//! One variant per [`Subject`]; adding a worker kind or event type is a
//! compile error everywhere the payload is matched.

use chrono::NaiveDate;
use ekyc_core::{DecisionStatus, ResultKind, SessionStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EventError;
use crate::subject::Subject;

/// Work item for a verification worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub artifact_id: String,
    /// Object storage key of the uploaded file
    pub file_key: String,
}

/// Identity fields extracted from the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrFields {
    pub full_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub document_number: Option<String>,
    pub nationality: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub file_key: String,
    pub quality: Decimal,
    #[serde(default)]
    pub fields: OcrFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceResult {
    pub file_key: String,
    pub quality: Decimal,
    /// Whether the selfie matched the document portrait
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessResult {
    pub file_key: String,
    pub quality: Decimal,
    pub is_live: bool,
}

/// A worker gave up on a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerFailure {
    pub kind: ResultKind,
    pub file_key: String,
    pub reason: String,
}

/// Automatic decision produced by the decision engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub decision_id: String,
    pub status: DecisionStatus,
    pub score: Decimal,
    pub reasons: Vec<String>,
    pub decided_by: String,
}

/// Manual decision applied by an administrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminDecisionEvent {
    pub decision_id: String,
    pub status: DecisionStatus,
    pub previous_status: SessionStatus,
    pub note: String,
    pub admin_id: String,
}

/// Mirror of an AuditLog row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub audit_id: String,
    pub action: String,
    pub actor: String,
    pub details: Value,
}

/// Payload keyed by event type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    OcrRequested(VerificationRequest),
    OcrCompleted(OcrResult),
    OcrFailed(WorkerFailure),
    FaceRequested(VerificationRequest),
    FaceCompleted(FaceResult),
    FaceFailed(WorkerFailure),
    LivenessRequested(VerificationRequest),
    LivenessCompleted(LivenessResult),
    LivenessFailed(WorkerFailure),
    Decision(DecisionEvent),
    AdminDecision(AdminDecisionEvent),
    Audit(AuditEvent),
}

impl EventPayload {
    /// Request payload for the worker of `kind`
    pub fn request(kind: ResultKind, request: VerificationRequest) -> Self {
        match kind {
            ResultKind::Ocr => EventPayload::OcrRequested(request),
            ResultKind::Face => EventPayload::FaceRequested(request),
            ResultKind::Liveness => EventPayload::LivenessRequested(request),
        }
    }

    /// Failure payload routed to the error subject of `failure.kind`
    pub fn failure(failure: WorkerFailure) -> Self {
        match failure.kind {
            ResultKind::Ocr => EventPayload::OcrFailed(failure),
            ResultKind::Face => EventPayload::FaceFailed(failure),
            ResultKind::Liveness => EventPayload::LivenessFailed(failure),
        }
    }

    pub fn subject(&self) -> Subject {
        match self {
            EventPayload::OcrRequested(_) => Subject::OcrRequest,
            EventPayload::OcrCompleted(_) => Subject::OcrResult,
            EventPayload::OcrFailed(_) => Subject::OcrError,
            EventPayload::FaceRequested(_) => Subject::FaceRequest,
            EventPayload::FaceCompleted(_) => Subject::FaceResult,
            EventPayload::FaceFailed(_) => Subject::FaceError,
            EventPayload::LivenessRequested(_) => Subject::LivenessRequest,
            EventPayload::LivenessCompleted(_) => Subject::LivenessResult,
            EventPayload::LivenessFailed(_) => Subject::LivenessError,
            EventPayload::Decision(_) => Subject::KycDecision,
            EventPayload::AdminDecision(_) => Subject::AdminDecision,
            EventPayload::Audit(_) => Subject::AuditLog,
        }
    }

    /// Kind and quality if this is a worker result
    pub fn result_quality(&self) -> Option<(ResultKind, Decimal)> {
        match self {
            EventPayload::OcrCompleted(r) => Some((ResultKind::Ocr, r.quality)),
            EventPayload::FaceCompleted(r) => Some((ResultKind::Face, r.quality)),
            EventPayload::LivenessCompleted(r) => Some((ResultKind::Liveness, r.quality)),
            _ => None,
        }
    }

    /// Request body if this is a worker request
    pub fn as_request(&self) -> Option<&VerificationRequest> {
        match self {
            EventPayload::OcrRequested(r)
            | EventPayload::FaceRequested(r)
            | EventPayload::LivenessRequested(r) => Some(r),
            _ => None,
        }
    }

    /// Decode `data` according to the subject it was published on
    pub fn from_value(subject: Subject, data: Value) -> Result<Self, EventError> {
        let malformed = |e: serde_json::Error| EventError::MalformedPayload {
            event_type: subject.as_str().to_string(),
            reason: e.to_string(),
        };

        let payload = match subject {
            Subject::OcrRequest => {
                EventPayload::OcrRequested(serde_json::from_value(data).map_err(malformed)?)
            }
            Subject::OcrResult => {
                EventPayload::OcrCompleted(serde_json::from_value(data).map_err(malformed)?)
            }
            Subject::OcrError => {
                EventPayload::OcrFailed(serde_json::from_value(data).map_err(malformed)?)
            }
            Subject::FaceRequest => {
                EventPayload::FaceRequested(serde_json::from_value(data).map_err(malformed)?)
            }
            Subject::FaceResult => {
                EventPayload::FaceCompleted(serde_json::from_value(data).map_err(malformed)?)
            }
            Subject::FaceError => {
                EventPayload::FaceFailed(serde_json::from_value(data).map_err(malformed)?)
            }
            Subject::LivenessRequest => {
                EventPayload::LivenessRequested(serde_json::from_value(data).map_err(malformed)?)
            }
            Subject::LivenessResult => {
                EventPayload::LivenessCompleted(serde_json::from_value(data).map_err(malformed)?)
            }
            Subject::LivenessError => {
                EventPayload::LivenessFailed(serde_json::from_value(data).map_err(malformed)?)
            }
            Subject::KycDecision => {
                EventPayload::Decision(serde_json::from_value(data).map_err(malformed)?)
            }
            Subject::AdminDecision => {
                EventPayload::AdminDecision(serde_json::from_value(data).map_err(malformed)?)
            }
            Subject::AuditLog => {
                EventPayload::Audit(serde_json::from_value(data).map_err(malformed)?)
            }
        };

        Ok(payload)
    }
}
