//! Admin operations: manual decisions and read models

use ekyc_core::{DecisionStatus, RequestContext};
use ekyc_store::{SessionFilter, SessionPage};

use crate::error::{WorkflowError, WorkflowResult};
use crate::types::{AdminDecisionAck, SessionDetail};
use crate::workflow::SessionWorkflow;

/// Largest page `list_sessions` serves
pub const MAX_PAGE_SIZE: u32 = 100;

impl SessionWorkflow {
    /// Apply a manual APPROVED/REJECTED decision.
    ///
    /// Allowed once the pipeline has produced an outcome (UNDER_REVIEW) and as
    /// an override of a terminal status. Every attempt appends a Decision row.
    pub async fn apply_admin_decision(
        &self,
        ctx: &RequestContext,
        session_id: &str,
        status: DecisionStatus,
        note: &str,
        admin_id: &str,
    ) -> WorkflowResult<AdminDecisionAck> {
        if status == DecisionStatus::Review {
            return Err(WorkflowError::validation(
                "admin decision must be APPROVED or REJECTED",
            ));
        }
        if admin_id.trim().is_empty() {
            return Err(WorkflowError::validation("admin id is required"));
        }

        let _lock = self.locks.acquire(session_id).await;
        let mut tx = self.store.begin().await?;

        let mut session = tx
            .get_session(session_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("session {}", session_id)))?;

        if !session.status.is_decided() {
            return Err(WorkflowError::state(format!(
                "session {} is still {}",
                session.id, session.status
            )));
        }

        let outcome = self
            .engine
            .record_admin_decision(&mut tx, &mut session, status, note, admin_id, ctx)
            .await?;
        tx.commit().await?;

        self.publish_outcome(ctx, &outcome).await?;

        Ok(AdminDecisionAck {
            session_id: session.id,
            decision_id: outcome.decision.id,
            status: session.status,
        })
    }

    pub async fn list_sessions(
        &self,
        filter: &SessionFilter,
        page: u32,
        size: u32,
    ) -> WorkflowResult<SessionPage> {
        if page == 0 {
            return Err(WorkflowError::validation("page starts at 1"));
        }
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(WorkflowError::validation(format!(
                "page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(self.store.list_sessions(filter, page, size).await?)
    }

    pub async fn get_session_detail(&self, session_id: &str) -> WorkflowResult<SessionDetail> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("session {}", session_id)))?;

        Ok(SessionDetail {
            pii: self.store.get_pii(session_id).await?,
            artifacts: self.store.list_artifacts(session_id).await?,
            results: self.store.list_results(session_id).await?,
            decisions: self.store.list_decisions(session_id).await?,
            audit: self.store.list_audit(session_id).await?,
            session,
        })
    }
}
