//! eKYC Workflow - session state machine
//!
//! ```text
//! CREATED → DOC_UPLOADED → SELFIE_UPLOADED → LIVENESS_PENDING
//!         → UNDER_REVIEW → {APPROVED, REJECTED}
//! ```
//!
//! Every mutation of one session runs under that session's lock and inside a
//! single store transaction. Events are published only after the transaction
//! commits.

pub mod error;
pub mod ingest;
pub mod locks;
pub mod types;
pub mod workflow;

mod admin;

pub use admin::MAX_PAGE_SIZE;
pub use error::{WorkflowError, WorkflowResult};
pub use ingest::{ResultIngestor, INGEST_GROUP};
pub use locks::{SessionLockGuard, SessionLocks};
pub use types::{
    AdminDecisionAck, RecordOutcome, ResultInput, SessionCreated, SessionDetail,
    SessionStatusView, UploadAck, UploadRequest,
};
pub use workflow::SessionWorkflow;
