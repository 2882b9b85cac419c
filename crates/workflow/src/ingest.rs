//! Worker result ingestion
//!
//! Consumes `<kind>.result` and `<kind>.error` in the [`INGEST_GROUP`] queue
//! group and hands each delivery to the state machine. Errors worth retrying
//! leave the message unacknowledged; anything else is logged and acked so a
//! poison message is not redelivered forever.

use async_trait::async_trait;
use ekyc_bus::{BusError, EventBus, EventSubscriber, Message};
use ekyc_core::{RequestContext, ResultKind, Step};
use ekyc_events::{
    decode, Envelope, EventPayload, FaceResult, LivenessResult, OcrResult, Subject,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::error::WorkflowError;
use crate::types::{RecordOutcome, ResultInput};
use crate::workflow::SessionWorkflow;

/// Queue group shared by every ingestor instance
pub const INGEST_GROUP: &str = "kyc-ingest";

pub struct ResultIngestor {
    workflow: Arc<SessionWorkflow>,
}

impl ResultIngestor {
    pub fn new(workflow: Arc<SessionWorkflow>) -> Self {
        Self { workflow }
    }

    /// Join the ingest group on every result and error subject
    pub async fn subscribe(self: Arc<Self>, bus: &dyn EventBus) -> Result<(), BusError> {
        for kind in Step::REQUIRED.iter().map(|step| step.result_kind()) {
            for subject in [Subject::result(kind), Subject::error(kind)] {
                bus.subscribe(subject.as_str(), INGEST_GROUP, self.clone())
                    .await?;
            }
        }
        Ok(())
    }

    async fn ingest(&self, envelope: Envelope) -> Result<(), WorkflowError> {
        let ctx = envelope.context();
        let event_id = envelope.metadata.event_id;
        let session_id = envelope.metadata.session_id;

        match envelope.data {
            EventPayload::OcrCompleted(result) => {
                let pii = Some(result.fields.clone());
                let input = result_input(session_id, event_id, ResultKind::Ocr, &result)?;
                self.record(&ctx, ResultInput { pii, ..input }).await
            }
            EventPayload::FaceCompleted(result) => {
                let input = result_input(session_id, event_id, ResultKind::Face, &result)?;
                self.record(&ctx, input).await
            }
            EventPayload::LivenessCompleted(result) => {
                let input = result_input(session_id, event_id, ResultKind::Liveness, &result)?;
                self.record(&ctx, input).await
            }
            EventPayload::OcrFailed(failure)
            | EventPayload::FaceFailed(failure)
            | EventPayload::LivenessFailed(failure) => {
                self.workflow
                    .record_failure(&ctx, &session_id, &failure)
                    .await
            }
            other => {
                tracing::debug!(
                    subject = %other.subject(),
                    event_id = %event_id,
                    "Ignoring event not meant for ingestion"
                );
                Ok(())
            }
        }
    }

    async fn record(&self, ctx: &RequestContext, input: ResultInput) -> Result<(), WorkflowError> {
        let session_id = input.session_id.clone();
        let event_id = input.event_id.clone();

        match self.workflow.record_result(ctx, input).await? {
            RecordOutcome::Recorded {
                decision: Some(status),
            } => {
                tracing::info!(
                    session_id = %session_id,
                    event_id = %event_id,
                    decision = %status,
                    "Session decided"
                );
            }
            RecordOutcome::Recorded { decision: None } => {}
            RecordOutcome::Duplicate => {
                tracing::debug!(
                    session_id = %session_id,
                    event_id = %event_id,
                    "Redelivered result acknowledged"
                );
            }
            RecordOutcome::Late => {}
        }
        Ok(())
    }
}

/// Worker result payloads that carry a quality score
trait Scored: Serialize {
    fn quality(&self) -> Decimal;
}

impl Scored for OcrResult {
    fn quality(&self) -> Decimal {
        self.quality
    }
}

impl Scored for FaceResult {
    fn quality(&self) -> Decimal {
        self.quality
    }
}

impl Scored for LivenessResult {
    fn quality(&self) -> Decimal {
        self.quality
    }
}

fn result_input<T: Scored>(
    session_id: String,
    event_id: String,
    kind: ResultKind,
    result: &T,
) -> Result<ResultInput, WorkflowError> {
    Ok(ResultInput {
        session_id,
        kind,
        event_id,
        quality: result.quality(),
        payload: serde_json::to_value(result)?,
        pii: None,
    })
}

#[async_trait]
impl EventSubscriber for ResultIngestor {
    fn name(&self) -> &str {
        "result-ingestor"
    }

    async fn handle(&self, message: &Message) -> Result<(), BusError> {
        let envelope = match decode(&message.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(
                    subject = %message.subject,
                    error = %e,
                    "Dropping undecodable message"
                );
                return Ok(());
            }
        };

        let event_id = envelope.event_id().to_string();
        let session_id = envelope.session_id().to_string();
        let correlation_id = envelope.correlation_id().to_string();

        match self.ingest(envelope).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    subject = %message.subject,
                    event_id = %event_id,
                    session_id = %session_id,
                    correlation_id = %correlation_id,
                    attempt = message.attempt,
                    error = %e,
                    "Ingestion failed, leaving message for redelivery"
                );
                Err(BusError::subscriber(self.name(), e))
            }
            Err(e) => {
                tracing::warn!(
                    subject = %message.subject,
                    event_id = %event_id,
                    session_id = %session_id,
                    correlation_id = %correlation_id,
                    error = %e,
                    "Ingestion rejected, acknowledging"
                );
                Ok(())
            }
        }
    }
}
