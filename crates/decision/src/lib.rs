//! eKYC Decision Engine
//!
//! Turns the newest OCR, FACE and LIVENESS qualities of a session into a
//! decision:
//!
//! ```text
//! composite = Σ(weight_k × quality_k) / Σ(weight_k)
//! composite >= approve_threshold  → APPROVED
//! composite <= reject_threshold   → REJECTED
//! otherwise                       → REVIEW (session goes UNDER_REVIEW)
//! ```
//!
//! Scoring ([`scoring`]) is pure. The [`DecisionEngine`] writes the Decision
//! row, the session status and the audit entry inside the caller's
//! transaction, and publishes the resulting events once the caller commits.

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod scoring;

pub use audit::audit_envelope;
pub use config::DecisionConfig;
pub use engine::{DecisionEngine, DecisionOutcome, SYSTEM_DECIDER};
pub use error::{DecisionError, DecisionResult};
pub use scoring::{assess, Assessment};
