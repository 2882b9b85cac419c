//! Fixed-window rate limiter
//!
//! One counter per (caller, route) at `rate_limit:<caller>:<route>`. The first
//! increment in a window arms the key's expiry; once the counter passes the
//! limit, requests are rejected until the key expires. Bursts straddling a
//! window boundary can admit up to twice the limit.

use crate::cache::CacheStore;
use ekyc_core::{KycError, KycResult, RequestContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

fn default_max_requests() -> u32 {
    100
}

fn default_window_secs() -> u64 {
    60
}

/// Limit per caller and route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window_secs: window.as_secs(),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Rejected { retry_after: Duration },
    /// The counter store failed; the request is let through
    Unchecked,
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Admission::Rejected { .. })
    }
}

/// Fixed-window limiter over a [`CacheStore`]
pub struct RateLimiter {
    cache: Arc<dyn CacheStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn CacheStore>, config: RateLimitConfig) -> Self {
        Self { cache, config }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    pub fn key(caller: &str, route: &str) -> String {
        format!("rate_limit:{}:{}", caller, route)
    }

    /// Count one request and decide whether it may proceed
    pub async fn check(&self, caller: &str, route: &str) -> Admission {
        let key = Self::key(caller, route);
        let window = self.config.window();

        let count = match self.cache.incr(&key).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(
                    caller,
                    route,
                    error = %e,
                    "Rate limit store failed, allowing request"
                );
                return Admission::Unchecked;
            }
        };

        if count == 1 {
            if let Err(e) = self.cache.expire(&key, window).await {
                tracing::warn!(caller, route, error = %e, "Failed to arm rate limit window");
            }
        }

        let limit = i64::from(self.config.max_requests);
        if count > limit {
            let retry_after = match self.cache.ttl(&key).await {
                Ok(Some(ttl)) if !ttl.is_zero() => ttl,
                _ => window,
            };
            return Admission::Rejected { retry_after };
        }

        Admission::Allowed {
            remaining: u32::try_from(limit - count).unwrap_or(0),
        }
    }

    /// [`RateLimiter::check`] as a `Result`, keyed by the context's caller
    pub async fn admit(&self, ctx: &RequestContext, route: &str) -> KycResult<()> {
        match self.check(&ctx.caller, route).await {
            Admission::Rejected { retry_after } => {
                tracing::warn!(
                    caller = %ctx.caller,
                    route,
                    correlation_id = %ctx.correlation_id,
                    retry_after_secs = retry_after.as_secs(),
                    "Rate limit exceeded"
                );
                Err(KycError::RateLimited { retry_after })
            }
            _ => Ok(()),
        }
    }
}
