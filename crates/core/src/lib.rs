//! eKYC Core - shared domain types
//!
//! Everything in this crate is a compatibility surface: the string values of
//! the enums below are persisted and travel on the event bus.

pub mod context;
pub mod error;
pub mod types;

pub use context::{RequestContext, CALLER_ID_HEADER, CORRELATION_ID_HEADER, IDEMPOTENCY_KEY_HEADER};
pub use error::{KycError, KycResult};
pub use types::{ArtifactType, DecisionStatus, ResultKind, SessionStatus, Step};
