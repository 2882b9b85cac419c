//! eKYC Session Store - durable relational state
//!
//! Seven relations: users, sessions, person_pii, artifacts, results,
//! decisions and audit_log. Every row below `sessions` is keyed to its
//! session and deleted with it.
//!
//! Reads go through [`SessionStore`]; every mutation runs inside a
//! [`StoreTx`] so a state change and its audit entry commit together.

pub mod error;
pub mod models;
pub mod schema;
pub mod store;
pub mod tx;

pub use error::StoreError;
pub use models::{
    Artifact, AuditEntry, DecisionRecord, PersonPii, ResultRecord, Session, SessionFilter,
    SessionPage, User,
};
pub use store::SessionStore;
pub use tx::StoreTx;
