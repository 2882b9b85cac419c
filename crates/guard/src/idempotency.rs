//! Idempotency guard
//!
//! Successful responses are cached under `idempotency:<route>:<token>`
//! together with a SHA-256 fingerprint of the request. A retry with the same
//! token gets the cached response back verbatim and the operation does not
//! run again; a fingerprint mismatch is logged as client misuse. Failures are
//! never cached.

use crate::cache::CacheStore;
use ekyc_core::{KycResult, RequestContext};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Replay window for cached responses
pub const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Serialize, Deserialize)]
struct CachedResponse {
    request_hash: String,
    response: serde_json::Value,
}

/// Replay cache wrapping mutating operations
pub struct IdempotencyGuard {
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl IdempotencyGuard {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self::with_ttl(cache, DEFAULT_IDEMPOTENCY_TTL)
    }

    pub fn with_ttl(cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn cache_key(route: &str, token: &str) -> String {
        format!("idempotency:{}:{}", route, token)
    }

    /// Run `op` at most once per (route, token).
    ///
    /// Without a token in `ctx` this is a plain pass-through. A token reused
    /// for a different request on the same route still replays the first
    /// response.
    pub async fn run<Req, T, F, Fut>(
        &self,
        route: &str,
        ctx: &RequestContext,
        request: &Req,
        op: F,
    ) -> KycResult<T>
    where
        Req: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = KycResult<T>>,
    {
        let Some(token) = ctx.idempotency_key.as_deref() else {
            return op().await;
        };

        let key = Self::cache_key(route, token);
        let request_hash = fingerprint(request);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<CachedResponse>(&raw) {
                Ok(cached) => match serde_json::from_value::<T>(cached.response) {
                    Ok(response) => {
                        if cached.request_hash != request_hash {
                            tracing::warn!(
                                route,
                                correlation_id = %ctx.correlation_id,
                                "Idempotency key reused with a different request, replaying"
                            );
                        }
                        tracing::info!(
                            route,
                            correlation_id = %ctx.correlation_id,
                            "Idempotency cache hit"
                        );
                        return Ok(response);
                    }
                    Err(e) => {
                        tracing::warn!(route, error = %e, "Cached response unreadable, executing");
                    }
                },
                Err(e) => {
                    tracing::warn!(route, error = %e, "Cached entry unreadable, executing");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    route,
                    correlation_id = %ctx.correlation_id,
                    error = %e,
                    "Idempotency cache unavailable, passing through"
                );
            }
        }

        let response = op().await?;
        self.remember(&key, request_hash, &response, ctx).await;
        Ok(response)
    }

    async fn remember<T: Serialize>(
        &self,
        key: &str,
        request_hash: String,
        response: &T,
        ctx: &RequestContext,
    ) {
        let entry = serde_json::to_value(response).and_then(|response| {
            serde_json::to_string(&CachedResponse {
                request_hash,
                response,
            })
        });

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "Response not cacheable");
                return;
            }
        };

        if let Err(e) = self.cache.set(key, entry, self.ttl).await {
            tracing::warn!(
                key,
                correlation_id = %ctx.correlation_id,
                error = %e,
                "Failed to cache idempotent response"
            );
        }
    }
}

/// Hex SHA-256 of the request's JSON form
fn fingerprint<Req: Serialize + ?Sized>(request: &Req) -> String {
    let bytes = serde_json::to_vec(request).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}
