//! Decision Engine - writes decisions and announces them
//!
//! Flow: Latest results → Assess → Decision row → Session status → Audit
//! → (caller commits) → Publish

use chrono::Utc;
use ekyc_bus::{publish_envelope, EventBus};
use ekyc_core::{DecisionStatus, RequestContext, SessionStatus};
use ekyc_events::{AdminDecisionEvent, DecisionEvent, Envelope, EventPayload};
use ekyc_store::{AuditEntry, DecisionRecord, Session, StoreTx};
use serde_json::json;
use std::sync::Arc;

use crate::audit::audit_envelope;
use crate::config::DecisionConfig;
use crate::error::{DecisionError, DecisionResult};
use crate::scoring::assess;

/// `decided_by` of automatic decisions
pub const SYSTEM_DECIDER: &str = "system";

/// A recorded decision and the events to publish once it is committed
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub decision: DecisionRecord,
    pub previous_status: SessionStatus,
    pub status: SessionStatus,
    events: Vec<Envelope>,
}

impl DecisionOutcome {
    pub fn events(&self) -> &[Envelope] {
        &self.events
    }
}

/// Main Decision Engine
pub struct DecisionEngine {
    config: DecisionConfig,
    bus: Arc<dyn EventBus>,
    source_service: String,
}

impl DecisionEngine {
    /// Create an engine; the configuration is validated up front
    pub fn new(
        config: DecisionConfig,
        bus: Arc<dyn EventBus>,
        source_service: impl Into<String>,
    ) -> DecisionResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            bus,
            source_service: source_service.into(),
        })
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Score the session's newest results and record the automatic decision.
    ///
    /// Runs inside `tx`; nothing is published until [`DecisionEngine::publish`].
    pub async fn decide(
        &self,
        tx: &mut StoreTx,
        session: &mut Session,
        ctx: &RequestContext,
    ) -> DecisionResult<DecisionOutcome> {
        if session.status.is_decided() {
            return Err(DecisionError::AlreadyDecided {
                session_id: session.id.clone(),
                status: session.status,
            });
        }
        if session.status != SessionStatus::LivenessPending {
            return Err(DecisionError::NotReady {
                session_id: session.id.clone(),
                status: session.status,
            });
        }

        let results = tx.latest_results(&session.id).await?;
        let qualities: Vec<_> = results.iter().map(|r| (r.kind, r.quality)).collect();
        let assessment = assess(&self.config, &qualities)?;

        let decision = DecisionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            status: assessment.status,
            score: Some(assessment.score),
            reasons: assessment.reasons.clone(),
            decided_by: SYSTEM_DECIDER.to_string(),
            note: None,
            created_at: Utc::now(),
            published: false,
        };
        tx.insert_decision(&decision).await?;

        let previous_status = session.status;
        session.advance_to(assessment.status.session_status());
        session.score = Some(assessment.score);
        tx.update_session(session).await?;

        let inputs: Vec<_> = results
            .iter()
            .map(|r| json!({"kind": r.kind, "event_id": r.event_id, "quality": r.quality}))
            .collect();
        let audit = AuditEntry::new(
            &session.id,
            "decision.made",
            SYSTEM_DECIDER,
            &ctx.correlation_id,
            json!({
                "decision_id": decision.id,
                "status": decision.status,
                "score": assessment.score,
                "reasons": assessment.reasons,
                "previous_status": previous_status,
                "results": inputs,
            }),
        );
        tx.insert_audit(&audit).await?;

        tracing::info!(
            session_id = %session.id,
            correlation_id = %ctx.correlation_id,
            status = %decision.status,
            score = %assessment.score,
            "Automatic decision recorded"
        );

        let decided = self.decision_event(&decision, &ctx.correlation_id);

        Ok(DecisionOutcome {
            previous_status,
            status: session.status,
            events: vec![decided, audit_envelope(&self.source_service, &audit)],
            decision,
        })
    }

    /// Record a manual decision. Overrides the current status unconditionally;
    /// the caller decides whether the override is allowed.
    pub async fn record_admin_decision(
        &self,
        tx: &mut StoreTx,
        session: &mut Session,
        status: DecisionStatus,
        note: &str,
        admin_id: &str,
        ctx: &RequestContext,
    ) -> DecisionResult<DecisionOutcome> {
        let decision = DecisionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            status,
            score: session.score,
            reasons: Vec::new(),
            decided_by: admin_id.to_string(),
            note: Some(note.to_string()),
            created_at: Utc::now(),
            published: false,
        };
        tx.insert_decision(&decision).await?;

        let previous_status = session.status;
        session.status = status.session_status();
        tx.update_session(session).await?;

        let audit = AuditEntry::new(
            &session.id,
            "decision.admin",
            admin_id,
            &ctx.correlation_id,
            json!({
                "decision_id": decision.id,
                "status": status,
                "previous_status": previous_status,
                "note": note,
            }),
        );
        tx.insert_audit(&audit).await?;

        tracing::info!(
            session_id = %session.id,
            correlation_id = %ctx.correlation_id,
            admin_id,
            from = %previous_status,
            to = %session.status,
            "Admin decision recorded"
        );

        let decided = Envelope::new(
            &self.source_service,
            &ctx.correlation_id,
            &session.id,
            EventPayload::AdminDecision(AdminDecisionEvent {
                decision_id: decision.id.clone(),
                status,
                previous_status,
                note: note.to_string(),
                admin_id: admin_id.to_string(),
            }),
        );

        Ok(DecisionOutcome {
            previous_status,
            status: session.status,
            events: vec![decided, audit_envelope(&self.source_service, &audit)],
            decision,
        })
    }

    /// Publish a committed outcome's events
    pub async fn publish(&self, outcome: &DecisionOutcome) -> DecisionResult<()> {
        for envelope in &outcome.events {
            publish_envelope(self.bus.as_ref(), envelope).await?;
        }
        Ok(())
    }

    /// Announce a stored automatic decision again, under its original id
    pub async fn republish(
        &self,
        decision: &DecisionRecord,
        ctx: &RequestContext,
    ) -> DecisionResult<()> {
        let envelope = self.decision_event(decision, &ctx.correlation_id);
        publish_envelope(self.bus.as_ref(), &envelope).await?;

        tracing::info!(
            session_id = %decision.session_id,
            decision_id = %decision.id,
            correlation_id = %ctx.correlation_id,
            "Decision republished"
        );
        Ok(())
    }

    /// `kyc.decision` envelope for an automatic decision
    fn decision_event(&self, decision: &DecisionRecord, correlation_id: &str) -> Envelope {
        Envelope::new(
            &self.source_service,
            correlation_id,
            &decision.session_id,
            EventPayload::Decision(DecisionEvent {
                decision_id: decision.id.clone(),
                status: decision.status,
                score: decision.score.unwrap_or_default(),
                reasons: decision.reasons.clone(),
                decided_by: decision.decided_by.clone(),
            }),
        )
    }
}
