//! eKYC Guards - admission control for externally facing operations
//!
//! - [`IdempotencyGuard`]: replays the stored response for a repeated
//!   `Idempotency-Key` instead of executing the operation again
//! - [`RateLimiter`]: fixed-window request counting per caller and route
//!
//! Both sit on a [`CacheStore`] and fail open when it is unavailable.

pub mod cache;
pub mod error;
pub mod idempotency;
pub mod rate_limit;

pub use cache::{CacheStore, MemoryCache};
pub use error::CacheError;
pub use idempotency::{IdempotencyGuard, DEFAULT_IDEMPOTENCY_TTL};
pub use rate_limit::{Admission, RateLimitConfig, RateLimiter};
