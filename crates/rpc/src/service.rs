//! Client-facing service
//!
//! Every call runs through the same boundary:
//! Rate limit → Idempotency (mutations) → Deadline → Error boundary
//!
//! Anything that escapes as a panic is turned into `INTERNAL_ERROR` and the
//! process keeps serving.

use ekyc_core::{DecisionStatus, KycError, KycResult, RequestContext, SessionStatus, Step};
use ekyc_guard::{IdempotencyGuard, RateLimiter};
use ekyc_store::{SessionFilter, SessionPage};
use ekyc_workflow::{
    AdminDecisionAck, SessionCreated, SessionDetail, SessionStatusView, SessionWorkflow,
    UploadAck, UploadRequest,
};
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

pub mod routes {
    pub const CREATE_SESSION: &str = "kyc.create_session";
    pub const DOCUMENT_UPLOADED: &str = "kyc.document_uploaded";
    pub const SELFIE_UPLOADED: &str = "kyc.selfie_uploaded";
    pub const LIVENESS_UPLOADED: &str = "kyc.liveness_uploaded";
    pub const GET_STATUS: &str = "kyc.get_status";
    pub const LIST_SESSIONS: &str = "admin.list_sessions";
    pub const SESSION_DETAIL: &str = "admin.session_detail";
    pub const APPLY_DECISION: &str = "admin.apply_decision";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSessionsRequest {
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

impl Default for ListSessionsRequest {
    fn default() -> Self {
        Self {
            status: None,
            user_id: None,
            page: default_page(),
            size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminDecisionRequest {
    pub session_id: String,
    pub status: DecisionStatus,
    #[serde(default)]
    pub note: String,
    pub admin_id: String,
}

/// The RPC surface of the eKYC workflow
pub struct KycService {
    workflow: Arc<SessionWorkflow>,
    idempotency: IdempotencyGuard,
    limiter: RateLimiter,
    timeout: Duration,
}

impl KycService {
    pub fn new(
        workflow: Arc<SessionWorkflow>,
        idempotency: IdempotencyGuard,
        limiter: RateLimiter,
        timeout: Duration,
    ) -> Self {
        Self {
            workflow,
            idempotency,
            limiter,
            timeout,
        }
    }

    pub fn workflow(&self) -> &Arc<SessionWorkflow> {
        &self.workflow
    }

    pub async fn create_session(
        &self,
        ctx: &RequestContext,
        request: &CreateSessionRequest,
    ) -> KycResult<SessionCreated> {
        self.mutate(routes::CREATE_SESSION, ctx, request, || async {
            Ok(self.workflow.create_session(ctx, &request.user_id).await?)
        })
        .await
    }

    pub async fn document_uploaded(
        &self,
        ctx: &RequestContext,
        request: &UploadRequest,
    ) -> KycResult<UploadAck> {
        self.upload(routes::DOCUMENT_UPLOADED, Step::Document, ctx, request)
            .await
    }

    pub async fn selfie_uploaded(
        &self,
        ctx: &RequestContext,
        request: &UploadRequest,
    ) -> KycResult<UploadAck> {
        self.upload(routes::SELFIE_UPLOADED, Step::Selfie, ctx, request)
            .await
    }

    pub async fn liveness_uploaded(
        &self,
        ctx: &RequestContext,
        request: &UploadRequest,
    ) -> KycResult<UploadAck> {
        self.upload(routes::LIVENESS_UPLOADED, Step::Liveness, ctx, request)
            .await
    }

    async fn upload(
        &self,
        route: &'static str,
        step: Step,
        ctx: &RequestContext,
        request: &UploadRequest,
    ) -> KycResult<UploadAck> {
        let ctx = ctx.clone().with_session(&request.session_id);
        self.mutate(route, &ctx, request, || async {
            Ok(self.workflow.upload(&ctx, step, request).await?)
        })
        .await
    }

    pub async fn get_status(
        &self,
        ctx: &RequestContext,
        session_id: &str,
    ) -> KycResult<SessionStatusView> {
        let ctx = ctx.clone().with_session(session_id);
        self.read(routes::GET_STATUS, &ctx, async {
            Ok(self.workflow.get_status(session_id).await?)
        })
        .await
    }

    pub async fn list_sessions(
        &self,
        ctx: &RequestContext,
        request: &ListSessionsRequest,
    ) -> KycResult<SessionPage> {
        let filter = SessionFilter {
            status: request.status,
            user_id: request.user_id.clone(),
        };
        self.read(routes::LIST_SESSIONS, ctx, async {
            Ok(self
                .workflow
                .list_sessions(&filter, request.page, request.size)
                .await?)
        })
        .await
    }

    pub async fn get_session_detail(
        &self,
        ctx: &RequestContext,
        session_id: &str,
    ) -> KycResult<SessionDetail> {
        let ctx = ctx.clone().with_session(session_id);
        self.read(routes::SESSION_DETAIL, &ctx, async {
            Ok(self.workflow.get_session_detail(session_id).await?)
        })
        .await
    }

    pub async fn apply_decision(
        &self,
        ctx: &RequestContext,
        request: &AdminDecisionRequest,
    ) -> KycResult<AdminDecisionAck> {
        let ctx = ctx.clone().with_session(&request.session_id);
        self.mutate(routes::APPLY_DECISION, &ctx, request, || async {
            Ok(self
                .workflow
                .apply_admin_decision(
                    &ctx,
                    &request.session_id,
                    request.status,
                    &request.note,
                    &request.admin_id,
                )
                .await?)
        })
        .await
    }

    /// Guarded mutation: replayed from the idempotency cache when the
    /// context carries a known key
    async fn mutate<Req, T, F, Fut>(
        &self,
        route: &'static str,
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
        self.limiter.admit(ctx, route).await?;
        self.boundary(route, ctx, self.idempotency.run(route, ctx, request, op))
            .await
    }

    async fn read<T, Fut>(&self, route: &'static str, ctx: &RequestContext, op: Fut) -> KycResult<T>
    where
        Fut: Future<Output = KycResult<T>>,
    {
        self.limiter.admit(ctx, route).await?;
        self.boundary(route, ctx, op).await
    }

    /// Deadline plus panic containment
    async fn boundary<T, Fut>(
        &self,
        route: &'static str,
        ctx: &RequestContext,
        op: Fut,
    ) -> KycResult<T>
    where
        Fut: Future<Output = KycResult<T>>,
    {
        let contained = AssertUnwindSafe(op).catch_unwind();

        let result = match tokio::time::timeout(self.timeout, contained).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => {
                tracing::error!(
                    route,
                    correlation_id = %ctx.correlation_id,
                    session_id = ctx.session_field(),
                    panic = panic_message(panic.as_ref()),
                    "Handler panicked"
                );
                Err(KycError::Internal)
            }
            Err(_) => {
                tracing::warn!(
                    route,
                    correlation_id = %ctx.correlation_id,
                    session_id = ctx.session_field(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Deadline exceeded"
                );
                Err(KycError::Timeout(self.timeout.as_millis() as u64))
            }
        };

        match &result {
            Ok(_) => tracing::debug!(route, correlation_id = %ctx.correlation_id, "Request served"),
            Err(KycError::Internal) => tracing::error!(
                route,
                correlation_id = %ctx.correlation_id,
                session_id = ctx.session_field(),
                code = KycError::Internal.code(),
                "Request failed"
            ),
            Err(e) => tracing::info!(
                route,
                correlation_id = %ctx.correlation_id,
                session_id = ctx.session_field(),
                code = e.code(),
                error = %e,
                "Request rejected"
            ),
        }

        result
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}
