//! CLI commands

use ekyc_core::{DecisionStatus, KycError, RequestContext, ResultKind, SessionStatus};
use ekyc_events::OcrFields;
use ekyc_workflow::UploadRequest;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use crate::context::AppContext;
use crate::service::{AdminDecisionRequest, CreateSessionRequest, ListSessionsRequest};
use crate::worker::FixedQualityWorker;

const CLI_CALLER: &str = "ekyc-cli";

fn cli_context(correlation_id: &str) -> RequestContext {
    RequestContext::new(CLI_CALLER).with_correlation_id(correlation_id)
}

/// Qualities reported by the demo workers
pub struct DemoQualities {
    pub ocr: Decimal,
    pub face: Decimal,
    pub liveness: Decimal,
}

/// Run one session through the whole pipeline with fixed-quality workers
pub async fn demo(
    ctx: &AppContext,
    user_id: &str,
    qualities: DemoQualities,
    correlation_id: &str,
) -> Result<(), anyhow::Error> {
    if ctx.store.get_user(user_id).await?.is_none() {
        ctx.store
            .register_user(user_id, &format!("{}@example.com", user_id))
            .await?;
        println!("👤 Registered user {}", user_id);
    }

    let fields = OcrFields {
        full_name: Some(format!("Demo User {}", user_id)),
        document_number: Some("000000000".to_string()),
        ..Default::default()
    };
    ctx.start_worker(Arc::new(
        FixedQualityWorker::new(ResultKind::Ocr, qualities.ocr).with_fields(fields),
    ))
    .await?;
    ctx.start_worker(Arc::new(FixedQualityWorker::new(ResultKind::Face, qualities.face)))
        .await?;
    ctx.start_worker(Arc::new(FixedQualityWorker::new(
        ResultKind::Liveness,
        qualities.liveness,
    )))
    .await?;

    let rctx = cli_context(correlation_id).with_user(user_id);
    let created = ctx
        .service
        .create_session(&rctx, &CreateSessionRequest {
            user_id: user_id.to_string(),
        })
        .await?;
    let session_id = created.session_id;
    println!("✅ Session {} created", session_id);

    let upload = |name: &str| UploadRequest::new(&session_id, format!("{}/{}", session_id, name));
    let ack = ctx
        .service
        .document_uploaded(&rctx, &upload("document.jpg"))
        .await?;
    println!("   document uploaded → {}", ack.status);
    let ack = ctx
        .service
        .selfie_uploaded(&rctx, &upload("selfie.jpg"))
        .await?;
    println!("   selfie uploaded   → {}", ack.status);
    let ack = ctx
        .service
        .liveness_uploaded(&rctx, &upload("liveness.mp4"))
        .await?;
    println!("   liveness uploaded → {}", ack.status);

    if !ctx.settle(Duration::from_secs(10)).await {
        println!("⚠️  Workers still busy after 10s");
    }

    let status = ctx.service.get_status(&rctx, &session_id).await?;
    let score = status
        .score
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    match status.status {
        SessionStatus::Approved => println!("✅ APPROVED (score {})", score),
        SessionStatus::Rejected => println!("❌ REJECTED (score {})", score),
        SessionStatus::UnderReview => println!("🔎 UNDER_REVIEW (score {})", score),
        other => println!("⏳ {} (no decision yet)", other),
    }
    Ok(())
}

/// Register an end user
pub async fn add_user(ctx: &AppContext, user_id: &str, email: &str) -> Result<(), anyhow::Error> {
    let user = ctx.store.register_user(user_id, email).await?;
    println!("✅ User {} <{}> registered", user.id, user.email);
    Ok(())
}

/// Print the status of a session
pub async fn status(
    ctx: &AppContext,
    session_id: &str,
    correlation_id: &str,
) -> Result<(), anyhow::Error> {
    let view = ctx
        .service
        .get_status(&cli_context(correlation_id), session_id)
        .await?;

    println!("📋 Session {}", view.session_id);
    println!("   Status:  {}", view.status);
    println!(
        "   Score:   {}",
        view.score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
    );
    let pending: Vec<_> = view.pending_steps.iter().map(|s| s.as_str()).collect();
    println!("   Pending: [{}]", pending.join(", "));
    Ok(())
}

/// List sessions, newest first
pub async fn list(
    ctx: &AppContext,
    request: ListSessionsRequest,
    correlation_id: &str,
) -> Result<(), anyhow::Error> {
    let page = ctx
        .service
        .list_sessions(&cli_context(correlation_id), &request)
        .await?;

    if page.items.is_empty() {
        println!("📭 No sessions");
        return Ok(());
    }

    println!("📋 Sessions (page {}, {} total):", page.page, page.total);
    println!("{:-<90}", "");
    println!(
        "{:<38} {:<12} {:<18} {:<8} {}",
        "SESSION", "USER", "STATUS", "SCORE", "CREATED"
    );
    println!("{:-<90}", "");
    for session in &page.items {
        println!(
            "{:<38} {:<12} {:<18} {:<8} {}",
            session.id,
            session.user_id,
            session.status.as_str(),
            session.score.map(|s| s.to_string()).unwrap_or_default(),
            session.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!("{:-<90}", "");
    Ok(())
}

/// Print everything recorded about a session as JSON
pub async fn detail(
    ctx: &AppContext,
    session_id: &str,
    correlation_id: &str,
) -> Result<(), anyhow::Error> {
    let detail = ctx
        .service
        .get_session_detail(&cli_context(correlation_id), session_id)
        .await?;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(())
}

/// Apply a manual decision
pub async fn decide(
    ctx: &AppContext,
    session_id: &str,
    status: DecisionStatus,
    admin_id: &str,
    note: &str,
    correlation_id: &str,
) -> Result<(), anyhow::Error> {
    let request = AdminDecisionRequest {
        session_id: session_id.to_string(),
        status,
        note: note.to_string(),
        admin_id: admin_id.to_string(),
    };

    match ctx
        .service
        .apply_decision(&cli_context(correlation_id), &request)
        .await
    {
        Ok(ack) => {
            println!(
                "✅ Session {} is now {} (decision {})",
                ack.session_id, ack.status, ack.decision_id
            );
            Ok(())
        }
        Err(KycError::State(msg)) => {
            println!("❌ Cannot decide yet: {}", msg);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
