//! Application configuration
//!
//! Loaded from an optional JSON file, then overridden from `EKYC_*`
//! environment variables. Every field has a default.

use ekyc_bus::DeliveryPolicy;
use ekyc_decision::DecisionConfig;
use ekyc_guard::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Identity stamped on published envelopes
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Deadline for client-facing calls
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_idempotency_ttl_secs")]
    pub idempotency_ttl_secs: u64,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub decision: DecisionConfig,
}

/// Redelivery policy of the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_redelivery_delay_ms")]
    pub redelivery_delay_ms: u64,

    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,
}

fn default_service_name() -> String {
    "kyc-service".to_string()
}

fn default_database_url() -> String {
    "sqlite:ekyc.db".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_idempotency_ttl_secs() -> u64 {
    15 * 60
}

fn default_redelivery_delay_ms() -> u64 {
    500
}

fn default_max_deliveries() -> u32 {
    5
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            redelivery_delay_ms: default_redelivery_delay_ms(),
            max_deliveries: default_max_deliveries(),
        }
    }
}

impl BusConfig {
    pub fn policy(&self) -> DeliveryPolicy {
        DeliveryPolicy {
            redelivery_delay: Duration::from_millis(self.redelivery_delay_ms),
            max_deliveries: self.max_deliveries,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            database_url: default_database_url(),
            request_timeout_ms: default_request_timeout_ms(),
            idempotency_ttl_secs: default_idempotency_ttl_secs(),
            rate_limit: RateLimitConfig::default(),
            bus: BusConfig::default(),
            decision: DecisionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// File (if any), then process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `EKYC_*` overrides read through `lookup`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("EKYC_DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(name) = lookup("EKYC_SERVICE_NAME") {
            self.service_name = name;
        }
        if let Some(ms) = parse_env(&lookup, "EKYC_REQUEST_TIMEOUT_MS")? {
            self.request_timeout_ms = ms;
        }
        if let Some(max) = parse_env(&lookup, "EKYC_RATE_LIMIT_REQUESTS")? {
            self.rate_limit.max_requests = max;
        }
        if let Some(secs) = parse_env(&lookup, "EKYC_RATE_LIMIT_WINDOW_SECS")? {
            self.rate_limit.window_secs = secs;
        }
        if let Some(secs) = parse_env(&lookup, "EKYC_IDEMPOTENCY_TTL_SECS")? {
            self.idempotency_ttl_secs = secs;
        }
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_ttl_secs)
    }
}

fn parse_env<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                name: name.to_string(),
                value,
            }),
    }
}
