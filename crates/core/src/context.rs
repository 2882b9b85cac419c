//! Request-scoped context passed explicitly through every call boundary

use serde::{Deserialize, Serialize};

/// Header carrying the client-supplied idempotency token
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Header carrying the correlation id propagated into event envelopes
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Header identifying the caller for rate limiting
pub const CALLER_ID_HEADER: &str = "X-Caller-ID";

/// Values that belong to a single external request or event delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Propagated from the originating external request
    pub correlation_id: String,

    /// Caller identity (user id, api key, or remote address)
    pub caller: String,

    /// Session the request concerns, once known
    pub session_id: Option<String>,

    /// Authenticated user, if any
    pub user_id: Option<String>,

    /// Client-supplied idempotency token
    pub idempotency_key: Option<String>,
}

impl RequestContext {
    /// New context with a fresh correlation id
    pub fn new(caller: impl Into<String>) -> Self {
        Self {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            caller: caller.into(),
            session_id: None,
            user_id: None,
            idempotency_key: None,
        }
    }

    /// Build a context from boundary headers.
    ///
    /// Header names are matched case-insensitively. A missing correlation id is
    /// generated; a missing caller falls back to `anonymous`.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut ctx = Self::new("anonymous");

        for (name, value) in headers {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if name.eq_ignore_ascii_case(CORRELATION_ID_HEADER) {
                ctx.correlation_id = value.to_string();
            } else if name.eq_ignore_ascii_case(CALLER_ID_HEADER) {
                ctx.caller = value.to_string();
            } else if name.eq_ignore_ascii_case(IDEMPOTENCY_KEY_HEADER) {
                ctx.idempotency_key = Some(value.to_string());
            }
        }

        ctx
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Session id for log fields, empty when unknown
    pub fn session_field(&self) -> &str {
        self.session_id.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_correlation_id() {
        let a = RequestContext::new("u1");
        let b = RequestContext::new("u1");
        assert_ne!(a.correlation_id, b.correlation_id);
        assert_eq!(a.caller, "u1");
        assert!(a.idempotency_key.is_none());
    }

    #[test]
    fn test_from_headers() {
        let headers = [
            ("x-correlation-id", "corr-1"),
            ("Idempotency-Key", "tok-1"),
            ("X-CALLER-ID", "10.0.0.1"),
            ("Content-Type", "application/json"),
        ];
        let ctx = RequestContext::from_headers(headers);

        assert_eq!(ctx.correlation_id, "corr-1");
        assert_eq!(ctx.idempotency_key.as_deref(), Some("tok-1"));
        assert_eq!(ctx.caller, "10.0.0.1");
    }

    #[test]
    fn test_from_headers_defaults() {
        let ctx = RequestContext::from_headers([("Idempotency-Key", "  ")]);
        assert_eq!(ctx.caller, "anonymous");
        assert!(!ctx.correlation_id.is_empty());
        assert!(ctx.idempotency_key.is_none());
    }

    #[test]
    fn test_builder() {
        let ctx = RequestContext::new("admin")
            .with_session("S-1")
            .with_user("u1")
            .with_correlation_id("c-9");

        assert_eq!(ctx.session_field(), "S-1");
        assert_eq!(ctx.user_id.as_deref(), Some("u1"));
        assert_eq!(ctx.correlation_id, "c-9");
    }
}
