//! Client-facing error taxonomy
//!
//! Crate-specific errors convert into [`KycError`] at the service boundary.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to external callers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KycError {
    /// Bad input; never retried automatically
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation is illegal for the current session state
    #[error("Illegal state: {0}")]
    State(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Store or bus unavailable; safe to retry
    #[error("Temporarily unavailable: {0}")]
    Transient(String),

    #[error("Deadline of {0}ms exceeded")]
    Timeout(u64),

    #[error("Rate limit exceeded, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Unexpected failure. The message is generic; details are only logged.
    #[error("Internal error")]
    Internal,
}

/// Result type for client-facing operations
pub type KycResult<T> = Result<T, KycError>;

impl KycError {
    pub fn validation(msg: impl Into<String>) -> Self {
        KycError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        KycError::NotFound(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        KycError::State(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        KycError::Transient(msg.into())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            KycError::Validation(_) => "VALIDATION_ERROR",
            KycError::NotFound(_) => "NOT_FOUND",
            KycError::State(_) => "STATE_ERROR",
            KycError::Conflict(_) => "CONFLICT",
            KycError::Transient(_) => "TRANSIENT_ERROR",
            KycError::Timeout(_) => "TIMEOUT",
            KycError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            KycError::Internal => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller (or bus redelivery) may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KycError::Transient(_) | KycError::Timeout(_) | KycError::RateLimited { .. }
        )
    }
}
