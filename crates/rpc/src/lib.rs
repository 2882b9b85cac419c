//! eKYC RPC - service facade and CLI orchestrator
//!
//! [`KycService`] is the client-facing surface: every call passes the rate
//! limiter, the idempotency guard (mutations only), a deadline and a panic
//! boundary before it reaches the session workflow. [`AppContext`] wires the
//! store, bus, decision engine, result ingestion and service together.

pub mod commands;
pub mod config;
pub mod context;
pub mod service;
pub mod worker;

pub use config::{AppConfig, BusConfig, ConfigError};
pub use context::{AppContext, ContextError};
pub use service::{
    AdminDecisionRequest, CreateSessionRequest, KycService, ListSessionsRequest,
};
pub use worker::{FixedQualityWorker, VerificationWorker, WorkerRunner, WorkerVerdict};
