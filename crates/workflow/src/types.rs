//! Request and response shapes of workflow operations

use ekyc_core::{DecisionStatus, ResultKind, SessionStatus, Step};
use ekyc_events::OcrFields;
use ekyc_store::{Artifact, AuditEntry, DecisionRecord, PersonPii, ResultRecord, Session};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
    pub status: SessionStatus,
    pub pending_steps: Vec<Step>,
}

/// An uploaded file for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub session_id: String,
    /// Object storage key
    pub file_key: String,
    /// Free-form upload metadata (content type, size, ...)
    #[serde(default)]
    pub metadata: Value,
}

impl UploadRequest {
    pub fn new(session_id: impl Into<String>, file_key: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            file_key: file_key.into(),
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadAck {
    pub session_id: String,
    pub artifact_id: String,
    pub status: SessionStatus,
    pub pending_steps: Vec<Step>,
}

/// Answer to GetStatus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatusView {
    pub session_id: String,
    pub status: SessionStatus,
    pub score: Option<Decimal>,
    pub pending_steps: Vec<Step>,
}

impl From<&Session> for SessionStatusView {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            status: session.status,
            score: session.score,
            pending_steps: session.pending_steps.clone(),
        }
    }
}

/// Everything recorded about a session, for admins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session: Session,
    pub pii: Option<PersonPii>,
    pub artifacts: Vec<Artifact>,
    pub results: Vec<ResultRecord>,
    /// Newest first; the head is the current decision
    pub decisions: Vec<DecisionRecord>,
    pub audit: Vec<AuditEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminDecisionAck {
    pub session_id: String,
    pub decision_id: String,
    pub status: SessionStatus,
}

/// A worker result on its way into the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultInput {
    pub session_id: String,
    pub kind: ResultKind,
    /// Envelope event id; deliveries sharing it are one result
    pub event_id: String,
    pub quality: Decimal,
    pub payload: Value,
    /// Extracted identity fields (OCR only)
    pub pii: Option<OcrFields>,
}

/// What happened to a delivered result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOutcome {
    /// Stored; `decision` is set if this result completed the session
    Recorded { decision: Option<DecisionStatus> },
    /// Same event id seen before; nothing written
    Duplicate,
    /// Session already decided; logged as an anomaly, not stored
    Late,
}
