//! Decision engine errors

use ekyc_core::{KycError, ResultKind, SessionStatus};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No {0} result to score")]
    MissingResult(ResultKind),

    #[error("{kind} quality {quality} is outside [0, 1]")]
    InvalidQuality { kind: ResultKind, quality: Decimal },

    #[error("Session {session_id} is {status}, no automatic decision possible")]
    AlreadyDecided {
        session_id: String,
        status: SessionStatus,
    },

    #[error("Session {session_id} is {status}, uploads are still pending")]
    NotReady {
        session_id: String,
        status: SessionStatus,
    },

    #[error("Store error: {0}")]
    Store(#[from] ekyc_store::StoreError),

    #[error("Bus error: {0}")]
    Bus(#[from] ekyc_bus::BusError),
}

/// Result type for decision operations
pub type DecisionResult<T> = Result<T, DecisionError>;

impl From<DecisionError> for KycError {
    fn from(err: DecisionError) -> Self {
        match err {
            DecisionError::Store(e) => e.into(),
            DecisionError::Bus(e) => KycError::transient(e.to_string()),
            DecisionError::InvalidQuality { .. } => KycError::validation(err.to_string()),
            DecisionError::AlreadyDecided { .. } | DecisionError::NotReady { .. } => {
                KycError::state(err.to_string())
            }
            DecisionError::Config(_) | DecisionError::MissingResult(_) => {
                tracing::error!(error = %err, "Decision engine failure");
                KycError::Internal
            }
        }
    }
}
