//! Domain enums shared by every crate
//!
//! Values are persisted verbatim; never rename a variant's serialized form.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Lifecycle status of a verification session
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Created,
    DocUploaded,
    SelfieUploaded,
    LivenessPending,
    UnderReview,
    Approved,
    Rejected,
}

impl SessionStatus {
    /// Position along the forward-only pipeline.
    ///
    /// Both terminal states share the highest rank.
    pub fn rank(&self) -> u8 {
        match self {
            SessionStatus::Created => 0,
            SessionStatus::DocUploaded => 1,
            SessionStatus::SelfieUploaded => 2,
            SessionStatus::LivenessPending => 3,
            SessionStatus::UnderReview => 4,
            SessionStatus::Approved | SessionStatus::Rejected => 5,
        }
    }

    /// APPROVED and REJECTED end the pipeline
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Approved | SessionStatus::Rejected)
    }

    /// True once the decision engine has produced an outcome
    pub fn is_decided(&self) -> bool {
        self.rank() >= SessionStatus::UnderReview.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "CREATED",
            SessionStatus::DocUploaded => "DOC_UPLOADED",
            SessionStatus::SelfieUploaded => "SELFIE_UPLOADED",
            SessionStatus::LivenessPending => "LIVENESS_PENDING",
            SessionStatus::UnderReview => "UNDER_REVIEW",
            SessionStatus::Approved => "APPROVED",
            SessionStatus::Rejected => "REJECTED",
        }
    }
}

/// A verification step the user must complete
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Document,
    Selfie,
    Liveness,
}

impl Step {
    /// Steps required for every new session, in upload order
    pub const REQUIRED: [Step; 3] = [Step::Document, Step::Selfie, Step::Liveness];

    /// The step that must be satisfied before this one
    pub fn previous(&self) -> Option<Step> {
        match self {
            Step::Document => None,
            Step::Selfie => Some(Step::Document),
            Step::Liveness => Some(Step::Selfie),
        }
    }

    /// Status the session advances to once this step is uploaded
    pub fn reached_status(&self) -> SessionStatus {
        match self {
            Step::Document => SessionStatus::DocUploaded,
            Step::Selfie => SessionStatus::SelfieUploaded,
            Step::Liveness => SessionStatus::LivenessPending,
        }
    }

    /// Worker result kind that satisfies this step
    pub fn result_kind(&self) -> ResultKind {
        match self {
            Step::Document => ResultKind::Ocr,
            Step::Selfie => ResultKind::Face,
            Step::Liveness => ResultKind::Liveness,
        }
    }

    pub fn artifact_type(&self) -> ArtifactType {
        match self {
            Step::Document => ArtifactType::Document,
            Step::Selfie => ArtifactType::Selfie,
            Step::Liveness => ArtifactType::LivenessVideo,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Document => "document",
            Step::Selfie => "selfie",
            Step::Liveness => "liveness",
        }
    }
}

/// Kind of verification result produced by a worker
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultKind {
    Ocr,
    Face,
    Liveness,
}

impl ResultKind {
    pub fn step(&self) -> Step {
        match self {
            ResultKind::Ocr => Step::Document,
            ResultKind::Face => Step::Selfie,
            ResultKind::Liveness => Step::Liveness,
        }
    }

    /// Subject prefix used by the worker of this kind (`ocr`, `face`, `liveness`)
    pub fn subject_prefix(&self) -> &'static str {
        match self {
            ResultKind::Ocr => "ocr",
            ResultKind::Face => "face",
            ResultKind::Liveness => "liveness",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Ocr => "OCR",
            ResultKind::Face => "FACE",
            ResultKind::Liveness => "LIVENESS",
        }
    }
}

/// Outcome recorded in a Decision row
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStatus {
    Approved,
    Review,
    Rejected,
}

impl DecisionStatus {
    /// Session status a decision of this kind moves the session to
    pub fn session_status(&self) -> SessionStatus {
        match self {
            DecisionStatus::Approved => SessionStatus::Approved,
            DecisionStatus::Review => SessionStatus::UnderReview,
            DecisionStatus::Rejected => SessionStatus::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Approved => "APPROVED",
            DecisionStatus::Review => "REVIEW",
            DecisionStatus::Rejected => "REJECTED",
        }
    }
}

/// Type of an uploaded artifact
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactType {
    Document,
    Selfie,
    LivenessVideo,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Document => "DOCUMENT",
            ArtifactType::Selfie => "SELFIE",
            ArtifactType::LivenessVideo => "LIVENESS_VIDEO",
        }
    }
}
