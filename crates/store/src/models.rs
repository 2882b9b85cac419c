//! Row models

use chrono::{DateTime, NaiveDate, Utc};
use ekyc_core::{ArtifactType, DecisionStatus, ResultKind, SessionStatus, Step};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Registered end user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// One verification attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub status: SessionStatus,
    /// Composite score, set once the decision engine has run
    pub score: Option<Decimal>,
    /// Steps not yet uploaded, in pipeline order
    pub pending_steps: Vec<Step>,
    /// Optimistic concurrency counter, bumped on every update
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session in CREATED with every required step pending
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            status: SessionStatus::Created,
            score: None,
            pending_steps: Step::REQUIRED.to_vec(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self, step: Step) -> bool {
        self.pending_steps.contains(&step)
    }

    /// Remove a step from the pending set. Returns false if it was not pending.
    pub fn complete_step(&mut self, step: Step) -> bool {
        let before = self.pending_steps.len();
        self.pending_steps.retain(|s| *s != step);
        self.pending_steps.len() != before
    }

    /// Move status forward; a target at or behind the current rank is a no-op
    pub fn advance_to(&mut self, status: SessionStatus) -> bool {
        if status.rank() > self.status.rank() {
            self.status = status;
            true
        } else {
            false
        }
    }
}

/// Identity data extracted by OCR, 1:1 with a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonPii {
    pub session_id: String,
    pub full_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub document_number: Option<String>,
    pub nationality: Option<String>,
    pub address: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Uploaded file reference; immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub session_id: String,
    pub artifact_type: ArtifactType,
    pub file_key: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(
        session_id: impl Into<String>,
        artifact_type: ArtifactType,
        file_key: impl Into<String>,
        metadata: Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            artifact_type,
            file_key: file_key.into(),
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// One worker result; append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: String,
    pub session_id: String,
    pub kind: ResultKind,
    /// Envelope event id; unique per (session, kind)
    pub event_id: String,
    pub quality: Decimal,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn new(
        session_id: impl Into<String>,
        kind: ResultKind,
        event_id: impl Into<String>,
        quality: Decimal,
        payload: Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            kind,
            event_id: event_id.into(),
            quality,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// A decision on a session; the newest row is current
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    pub session_id: String,
    pub status: DecisionStatus,
    pub score: Option<Decimal>,
    pub reasons: Vec<String>,
    /// `system` for automatic decisions, the admin id otherwise
    pub decided_by: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set once the decision event has reached the bus
    #[serde(default)]
    pub published: bool,
}

/// Append-only record of a state-changing event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub session_id: String,
    pub action: String,
    pub actor: String,
    pub correlation_id: String,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        session_id: impl Into<String>,
        action: impl Into<String>,
        actor: impl Into<String>,
        correlation_id: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            action: action.into(),
            actor: actor.into(),
            correlation_id: correlation_id.into(),
            details,
            created_at: Utc::now(),
        }
    }
}

/// Admin listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub user_id: Option<String>,
}

/// One page of sessions, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPage {
    pub items: Vec<Session>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
}
