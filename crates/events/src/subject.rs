//! Subject catalogue
//!
//! The subject a message is published on doubles as its `event_type`.

use ekyc_core::ResultKind;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Known event subjects
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
pub enum Subject {
    #[strum(serialize = "ocr.request")]
    #[serde(rename = "ocr.request")]
    OcrRequest,
    #[strum(serialize = "ocr.result")]
    #[serde(rename = "ocr.result")]
    OcrResult,
    #[strum(serialize = "ocr.error")]
    #[serde(rename = "ocr.error")]
    OcrError,

    #[strum(serialize = "face.request")]
    #[serde(rename = "face.request")]
    FaceRequest,
    #[strum(serialize = "face.result")]
    #[serde(rename = "face.result")]
    FaceResult,
    #[strum(serialize = "face.error")]
    #[serde(rename = "face.error")]
    FaceError,

    #[strum(serialize = "liveness.request")]
    #[serde(rename = "liveness.request")]
    LivenessRequest,
    #[strum(serialize = "liveness.result")]
    #[serde(rename = "liveness.result")]
    LivenessResult,
    #[strum(serialize = "liveness.error")]
    #[serde(rename = "liveness.error")]
    LivenessError,

    #[strum(serialize = "kyc.decision")]
    #[serde(rename = "kyc.decision")]
    KycDecision,
    #[strum(serialize = "admin.decision")]
    #[serde(rename = "admin.decision")]
    AdminDecision,
    #[strum(serialize = "audit.log")]
    #[serde(rename = "audit.log")]
    AuditLog,
}

impl Subject {
    pub fn request(kind: ResultKind) -> Self {
        match kind {
            ResultKind::Ocr => Subject::OcrRequest,
            ResultKind::Face => Subject::FaceRequest,
            ResultKind::Liveness => Subject::LivenessRequest,
        }
    }

    pub fn result(kind: ResultKind) -> Self {
        match kind {
            ResultKind::Ocr => Subject::OcrResult,
            ResultKind::Face => Subject::FaceResult,
            ResultKind::Liveness => Subject::LivenessResult,
        }
    }

    pub fn error(kind: ResultKind) -> Self {
        match kind {
            ResultKind::Ocr => Subject::OcrError,
            ResultKind::Face => Subject::FaceError,
            ResultKind::Liveness => Subject::LivenessError,
        }
    }

    /// Worker kind this subject belongs to, if any
    pub fn kind(&self) -> Option<ResultKind> {
        match self {
            Subject::OcrRequest | Subject::OcrResult | Subject::OcrError => Some(ResultKind::Ocr),
            Subject::FaceRequest | Subject::FaceResult | Subject::FaceError => {
                Some(ResultKind::Face)
            }
            Subject::LivenessRequest | Subject::LivenessResult | Subject::LivenessError => {
                Some(ResultKind::Liveness)
            }
            Subject::KycDecision | Subject::AdminDecision | Subject::AuditLog => None,
        }
    }

    /// Error-signalling subjects are duplicated to their dead-letter subject
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Subject::OcrError | Subject::FaceError | Subject::LivenessError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::OcrRequest => "ocr.request",
            Subject::OcrResult => "ocr.result",
            Subject::OcrError => "ocr.error",
            Subject::FaceRequest => "face.request",
            Subject::FaceResult => "face.result",
            Subject::FaceError => "face.error",
            Subject::LivenessRequest => "liveness.request",
            Subject::LivenessResult => "liveness.result",
            Subject::LivenessError => "liveness.error",
            Subject::KycDecision => "kyc.decision",
            Subject::AdminDecision => "admin.decision",
            Subject::AuditLog => "audit.log",
        }
    }

    /// `<subject>.dlq`
    pub fn dlq(&self) -> String {
        dlq_subject(self.as_str())
    }
}

/// Dead-letter subject for any subject string
pub fn dlq_subject(subject: &str) -> String {
    format!("{}.dlq", subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_as_str_matches_display_and_parse() {
        for subject in Subject::iter() {
            assert_eq!(subject.to_string(), subject.as_str());
            assert_eq!(Subject::from_str(subject.as_str()).unwrap(), subject);
            assert_eq!(
                serde_json::to_string(&subject).unwrap(),
                format!("\"{}\"", subject.as_str())
            );
        }
    }

    #[test]
    fn test_kind_routing() {
        assert_eq!(Subject::request(ResultKind::Face), Subject::FaceRequest);
        assert_eq!(Subject::result(ResultKind::Liveness).as_str(), "liveness.result");
        assert_eq!(Subject::error(ResultKind::Ocr).kind(), Some(ResultKind::Ocr));
        assert_eq!(Subject::KycDecision.kind(), None);
    }

    #[test]
    fn test_error_subjects_and_dlq() {
        assert!(Subject::OcrError.is_error());
        assert!(!Subject::OcrResult.is_error());
        assert!(!Subject::AuditLog.is_error());
        assert_eq!(Subject::FaceError.dlq(), "face.error.dlq");
    }

    #[test]
    fn test_unknown_subject() {
        assert!(Subject::from_str("billing.charge").is_err());
    }
}
