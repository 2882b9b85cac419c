//! Workflow errors

use ekyc_core::KycError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Illegal state: {0}")]
    State(String),

    #[error("Store error: {0}")]
    Store(#[from] ekyc_store::StoreError),

    #[error("Decision error: {0}")]
    Decision(#[from] ekyc_decision::DecisionError),

    #[error("Publish failed: {0}")]
    Publish(#[from] ekyc_bus::BusError),

    #[error("Payload encoding failed: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        WorkflowError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        WorkflowError::NotFound(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        WorkflowError::State(msg.into())
    }

    /// Whether redelivering the triggering event could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::Store(ekyc_store::StoreError::Database(_))
            | WorkflowError::Store(ekyc_store::StoreError::VersionConflict { .. })
            | WorkflowError::Publish(_) => true,
            WorkflowError::Decision(ekyc_decision::DecisionError::Store(e)) => matches!(
                e,
                ekyc_store::StoreError::Database(_) | ekyc_store::StoreError::VersionConflict { .. }
            ),
            WorkflowError::Decision(ekyc_decision::DecisionError::Bus(_)) => true,
            _ => false,
        }
    }
}

impl From<WorkflowError> for KycError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(msg) => KycError::Validation(msg),
            WorkflowError::NotFound(msg) => KycError::NotFound(msg),
            WorkflowError::State(msg) => KycError::State(msg),
            WorkflowError::Store(e) => e.into(),
            WorkflowError::Decision(e) => e.into(),
            WorkflowError::Publish(e) => KycError::transient(e.to_string()),
            WorkflowError::Payload(e) => {
                tracing::error!(error = %e, "Result payload could not be encoded");
                KycError::Internal
            }
        }
    }
}
