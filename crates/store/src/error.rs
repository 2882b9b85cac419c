//! Store errors

use ekyc_core::KycError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Session {session_id} was modified concurrently (expected version {expected})")]
    VersionConflict { session_id: String, expected: i64 },

    #[error("Already exists: {0}")]
    Duplicate(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn corrupt(column: &str, value: &str) -> Self {
        StoreError::Corrupt(format!("{} = {:?}", column, value))
    }
}

impl From<StoreError> for KycError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                KycError::Conflict(db.message().to_string())
            }
            StoreError::Database(e) => KycError::transient(e.to_string()),
            StoreError::VersionConflict { .. } => KycError::Conflict(err.to_string()),
            StoreError::Duplicate(what) => KycError::Conflict(what),
            StoreError::Corrupt(_) | StoreError::Json(_) => {
                tracing::error!(error = %err, "Store returned unreadable data");
                KycError::Internal
            }
        }
    }
}
