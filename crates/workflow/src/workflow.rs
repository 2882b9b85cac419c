//! Session state machine
//!
//! Flow of every mutation: Lock → Begin → Validate → Write (+ audit) → Commit
//! → Publish

use chrono::Utc;
use ekyc_bus::{publish_envelope, EventBus};
use ekyc_core::{RequestContext, ResultKind, Step};
use ekyc_decision::{audit_envelope, DecisionEngine, DecisionOutcome, SYSTEM_DECIDER};
use ekyc_events::{Envelope, EventPayload, VerificationRequest, WorkerFailure};
use ekyc_store::{
    Artifact, AuditEntry, DecisionRecord, PersonPii, ResultRecord, Session, SessionStore,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{WorkflowError, WorkflowResult};
use crate::locks::SessionLocks;
use crate::types::{
    RecordOutcome, ResultInput, SessionCreated, SessionStatusView, UploadAck, UploadRequest,
};

/// Owns every transition of a session
pub struct SessionWorkflow {
    pub(crate) store: SessionStore,
    pub(crate) bus: Arc<dyn EventBus>,
    pub(crate) engine: Arc<DecisionEngine>,
    pub(crate) locks: SessionLocks,
    pub(crate) source_service: String,
}

impl SessionWorkflow {
    pub fn new(
        store: SessionStore,
        bus: Arc<dyn EventBus>,
        engine: Arc<DecisionEngine>,
        source_service: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bus,
            engine,
            locks: SessionLocks::new(),
            source_service: source_service.into(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn locks(&self) -> &SessionLocks {
        &self.locks
    }

    /// Open a new session for `user_id` with every step pending
    pub async fn create_session(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> WorkflowResult<SessionCreated> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(WorkflowError::validation("user id is required"));
        }

        let mut tx = self.store.begin().await?;
        if !tx.user_exists(user_id).await? {
            return Err(WorkflowError::validation(format!("unknown user {}", user_id)));
        }

        let session = Session::new(user_id);
        tx.insert_session(&session).await?;

        let audit = AuditEntry::new(
            &session.id,
            "session.created",
            &ctx.caller,
            &ctx.correlation_id,
            json!({"user_id": user_id, "pending_steps": session.pending_steps}),
        );
        tx.insert_audit(&audit).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            user_id,
            correlation_id = %ctx.correlation_id,
            "Session created"
        );

        self.publish_audit(&audit).await;

        Ok(SessionCreated {
            session_id: session.id,
            status: session.status,
            pending_steps: session.pending_steps,
        })
    }

    /// Record the upload for `step` and dispatch it to its worker.
    ///
    /// The previous step must already be uploaded. Re-uploading a step that
    /// is no longer pending records a new artifact and dispatches it again;
    /// the status never moves backwards.
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        step: Step,
        request: &UploadRequest,
    ) -> WorkflowResult<UploadAck> {
        if request.file_key.trim().is_empty() {
            return Err(WorkflowError::validation("file key is required"));
        }

        let _lock = self.locks.acquire(&request.session_id).await;
        let mut tx = self.store.begin().await?;

        let mut session = tx
            .get_session(&request.session_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("session {}", request.session_id)))?;

        if session.status.is_terminal() {
            return Err(WorkflowError::state(format!(
                "session {} is {}",
                session.id, session.status
            )));
        }
        if session.status.is_decided() {
            return Err(WorkflowError::state(format!(
                "session {} is awaiting an admin decision",
                session.id
            )));
        }
        if let Some(previous) = step.previous() {
            if session.is_pending(previous) {
                return Err(WorkflowError::state(format!(
                    "{} must be uploaded before {}",
                    previous, step
                )));
            }
        }

        let artifact = Artifact::new(
            &session.id,
            step.artifact_type(),
            &request.file_key,
            request.metadata.clone(),
        );
        tx.insert_artifact(&artifact).await?;

        let previous_status = session.status;
        let first_upload = session.complete_step(step);
        session.advance_to(step.reached_status());
        tx.update_session(&mut session).await?;

        let audit = AuditEntry::new(
            &session.id,
            "artifact.uploaded",
            &ctx.caller,
            &ctx.correlation_id,
            json!({
                "artifact_id": artifact.id,
                "artifact_type": artifact.artifact_type,
                "file_key": artifact.file_key,
                "step": step,
                "retake": !first_upload,
                "from": previous_status,
                "to": session.status,
            }),
        );
        tx.insert_audit(&audit).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            correlation_id = %ctx.correlation_id,
            step = %step,
            status = %session.status,
            retake = !first_upload,
            "Artifact recorded"
        );

        let request_event = Envelope::new(
            &self.source_service,
            &ctx.correlation_id,
            &session.id,
            EventPayload::request(
                step.result_kind(),
                VerificationRequest {
                    artifact_id: artifact.id.clone(),
                    file_key: artifact.file_key.clone(),
                },
            ),
        );
        if let Err(e) = publish_envelope(self.bus.as_ref(), &request_event).await {
            tracing::error!(
                session_id = %session.id,
                correlation_id = %ctx.correlation_id,
                error = %e,
                "Verification request not dispatched"
            );
            return Err(e.into());
        }

        self.publish_audit(&audit).await;

        Ok(UploadAck {
            session_id: session.id,
            artifact_id: artifact.id,
            status: session.status,
            pending_steps: session.pending_steps,
        })
    }

    pub async fn get_status(&self, session_id: &str) -> WorkflowResult<SessionStatusView> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("session {}", session_id)))?;

        Ok(SessionStatusView::from(&session))
    }

    /// Ingest one worker result.
    ///
    /// Deliveries sharing an event id are recorded once. The decision fires
    /// in the same transaction as the result that completes the required set,
    /// so it fires exactly once whatever the arrival order. A result is only
    /// accepted for a step that has been uploaded.
    pub async fn record_result(
        &self,
        ctx: &RequestContext,
        input: ResultInput,
    ) -> WorkflowResult<RecordOutcome> {
        if input.quality.is_sign_negative() || input.quality > Decimal::ONE {
            return Err(WorkflowError::validation(format!(
                "{} quality {} is outside [0, 1]",
                input.kind, input.quality
            )));
        }

        let _lock = self.locks.acquire(&input.session_id).await;
        let mut tx = self.store.begin().await?;

        let mut session = tx
            .get_session(&input.session_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("session {}", input.session_id)))?;

        if tx
            .result_exists(&session.id, input.kind, &input.event_id)
            .await?
        {
            tracing::debug!(
                session_id = %session.id,
                event_id = %input.event_id,
                kind = %input.kind,
                "Duplicate result discarded"
            );
            let pending = if session.status.is_decided() {
                tx.latest_decision(&session.id)
                    .await?
                    .filter(|d| !d.published && d.decided_by == SYSTEM_DECIDER)
            } else {
                None
            };
            tx.rollback().await?;

            if let Some(decision) = pending {
                self.redeliver_decision(ctx, &decision).await?;
            }
            return Ok(RecordOutcome::Duplicate);
        }

        if session.status.is_decided() {
            let audit = AuditEntry::new(
                &session.id,
                "result.late",
                &ctx.caller,
                &ctx.correlation_id,
                json!({
                    "kind": input.kind,
                    "event_id": input.event_id,
                    "quality": input.quality,
                    "status": session.status,
                }),
            );
            tx.insert_audit(&audit).await?;
            tx.commit().await?;

            tracing::warn!(
                session_id = %session.id,
                event_id = %input.event_id,
                kind = %input.kind,
                status = %session.status,
                "Result arrived after decision, recorded as anomaly"
            );
            self.publish_audit(&audit).await;
            return Ok(RecordOutcome::Late);
        }

        let step = input.kind.step();
        if session.is_pending(step) {
            return Err(WorkflowError::state(format!(
                "{} result for session {} before its {} upload",
                input.kind, session.id, step
            )));
        }

        let record = ResultRecord::new(
            &session.id,
            input.kind,
            &input.event_id,
            input.quality,
            input.payload,
        );
        if !tx.insert_result(&record).await? {
            return Ok(RecordOutcome::Duplicate);
        }

        if input.kind == ResultKind::Ocr {
            if let Some(fields) = input.pii {
                tx.upsert_pii(&PersonPii {
                    session_id: session.id.clone(),
                    full_name: fields.full_name,
                    date_of_birth: fields.date_of_birth,
                    document_number: fields.document_number,
                    nationality: fields.nationality,
                    address: fields.address,
                    updated_at: Utc::now(),
                })
                .await?;
            }
        }

        let audit = AuditEntry::new(
            &session.id,
            "result.recorded",
            &ctx.caller,
            &ctx.correlation_id,
            json!({
                "result_id": record.id,
                "kind": record.kind,
                "event_id": record.event_id,
                "quality": record.quality,
            }),
        );
        tx.insert_audit(&audit).await?;

        let received: HashSet<ResultKind> = tx
            .latest_results(&session.id)
            .await?
            .into_iter()
            .map(|r| r.kind)
            .collect();
        let complete = session.pending_steps.is_empty()
            && Step::REQUIRED
                .iter()
                .all(|step| received.contains(&step.result_kind()));

        let outcome = if complete {
            Some(self.engine.decide(&mut tx, &mut session, ctx).await?)
        } else {
            None
        };

        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            correlation_id = %ctx.correlation_id,
            event_id = %record.event_id,
            kind = %record.kind,
            quality = %record.quality,
            "Result recorded"
        );

        self.publish_audit(&audit).await;
        if let Some(outcome) = &outcome {
            self.publish_outcome(ctx, outcome).await?;
        }

        Ok(RecordOutcome::Recorded {
            decision: outcome.map(|o| o.decision.status),
        })
    }

    /// Record a worker failure as an audit entry; the status is unchanged
    pub async fn record_failure(
        &self,
        ctx: &RequestContext,
        session_id: &str,
        failure: &WorkerFailure,
    ) -> WorkflowResult<()> {
        let _lock = self.locks.acquire(session_id).await;
        let mut tx = self.store.begin().await?;

        if tx.get_session(session_id).await?.is_none() {
            return Err(WorkflowError::not_found(format!("session {}", session_id)));
        }

        let audit = AuditEntry::new(
            session_id,
            "worker.failed",
            &ctx.caller,
            &ctx.correlation_id,
            json!({
                "kind": failure.kind,
                "file_key": failure.file_key,
                "reason": failure.reason,
            }),
        );
        tx.insert_audit(&audit).await?;
        tx.commit().await?;

        tracing::warn!(
            session_id,
            correlation_id = %ctx.correlation_id,
            kind = %failure.kind,
            reason = %failure.reason,
            "Worker reported failure"
        );

        self.publish_audit(&audit).await;
        Ok(())
    }

    /// Mirror an audit entry onto `audit.log`. The row is authoritative, so a
    /// failed publish is only logged.
    pub(crate) async fn publish_audit(&self, entry: &AuditEntry) {
        let envelope = audit_envelope(&self.source_service, entry);
        if let Err(e) = publish_envelope(self.bus.as_ref(), &envelope).await {
            tracing::warn!(
                session_id = %entry.session_id,
                action = %entry.action,
                error = %e,
                "Audit event not published"
            );
        }
    }

    pub(crate) async fn publish_outcome(
        &self,
        ctx: &RequestContext,
        outcome: &DecisionOutcome,
    ) -> WorkflowResult<()> {
        if let Err(e) = self.engine.publish(outcome).await {
            tracing::error!(
                session_id = %outcome.decision.session_id,
                decision_id = %outcome.decision.id,
                correlation_id = %ctx.correlation_id,
                error = %e,
                "Decision committed but not published"
            );
            return Err(e.into());
        }
        self.mark_published(&outcome.decision.id).await;
        Ok(())
    }

    /// Publish a committed automatic decision whose event never went out
    async fn redeliver_decision(
        &self,
        ctx: &RequestContext,
        decision: &DecisionRecord,
    ) -> WorkflowResult<()> {
        tracing::warn!(
            session_id = %decision.session_id,
            decision_id = %decision.id,
            correlation_id = %ctx.correlation_id,
            "Decision was never published, publishing again"
        );
        self.engine.republish(decision, ctx).await?;
        self.mark_published(&decision.id).await;
        Ok(())
    }

    async fn mark_published(&self, decision_id: &str) {
        if let Err(e) = self.store.mark_decision_published(decision_id).await {
            tracing::warn!(
                decision_id,
                error = %e,
                "Published decision not flagged, a redelivery may announce it again"
            );
        }
    }
}
