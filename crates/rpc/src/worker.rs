//! Verification worker harness
//!
//! The inference itself is opaque: a [`VerificationWorker`] turns a file key
//! into a verdict. [`WorkerRunner`] does the bus plumbing around it, consuming
//! `<kind>.request` and answering with `<kind>.result` or `<kind>.error`.

use async_trait::async_trait;
use ekyc_bus::{publish_envelope, BusError, EventBus, EventSubscriber, Message};
use ekyc_core::ResultKind;
use ekyc_events::{
    decode, Envelope, EventPayload, FaceResult, LivenessResult, OcrFields, OcrResult, Subject,
    WorkerFailure,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// What a worker concluded about one file
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerVerdict {
    /// Confidence in [0, 1]
    pub quality: Decimal,
    /// Face matched / subject is live; ignored for OCR
    pub passed: bool,
    /// Extracted identity fields; OCR only
    pub fields: OcrFields,
}

#[async_trait]
pub trait VerificationWorker: Send + Sync {
    fn kind(&self) -> ResultKind;

    /// Inspect the stored file. `Err` carries the reason the file could not
    /// be assessed.
    async fn verify(&self, file_key: &str) -> Result<WorkerVerdict, String>;
}

/// Bus adapter around one worker
pub struct WorkerRunner {
    worker: Arc<dyn VerificationWorker>,
    bus: Arc<dyn EventBus>,
    name: String,
}

impl WorkerRunner {
    pub fn new(worker: Arc<dyn VerificationWorker>, bus: Arc<dyn EventBus>) -> Self {
        let name = format!("{}-worker", worker.kind().subject_prefix());
        Self { worker, bus, name }
    }

    /// Queue group of every worker of `kind`
    pub fn group(kind: ResultKind) -> String {
        format!("{}-workers", kind.subject_prefix())
    }

    /// Join the worker group on the request subject
    pub async fn start(self: Arc<Self>) -> Result<(), BusError> {
        let kind = self.worker.kind();
        let bus = self.bus.clone();
        bus.subscribe(Subject::request(kind).as_str(), &Self::group(kind), self)
            .await
    }

    fn answer(&self, file_key: &str, verdict: Result<WorkerVerdict, String>) -> EventPayload {
        let kind = self.worker.kind();
        let file_key = file_key.to_string();

        match verdict {
            Ok(v) => match kind {
                ResultKind::Ocr => EventPayload::OcrCompleted(OcrResult {
                    file_key,
                    quality: v.quality,
                    fields: v.fields,
                }),
                ResultKind::Face => EventPayload::FaceCompleted(FaceResult {
                    file_key,
                    quality: v.quality,
                    matched: v.passed,
                }),
                ResultKind::Liveness => EventPayload::LivenessCompleted(LivenessResult {
                    file_key,
                    quality: v.quality,
                    is_live: v.passed,
                }),
            },
            Err(reason) => EventPayload::failure(WorkerFailure {
                kind,
                file_key,
                reason,
            }),
        }
    }
}

#[async_trait]
impl EventSubscriber for WorkerRunner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, message: &Message) -> Result<(), BusError> {
        let envelope = match decode(&message.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(worker = %self.name, error = %e, "Dropping undecodable request");
                return Ok(());
            }
        };
        let Some(request) = envelope.data.as_request() else {
            tracing::debug!(worker = %self.name, subject = %envelope.subject(), "Not a request");
            return Ok(());
        };

        tracing::debug!(
            worker = %self.name,
            session_id = %envelope.session_id(),
            correlation_id = %envelope.correlation_id(),
            file_key = %request.file_key,
            "Verifying"
        );

        let verdict = self.worker.verify(&request.file_key).await;
        if let Err(reason) = &verdict {
            tracing::warn!(
                worker = %self.name,
                session_id = %envelope.session_id(),
                correlation_id = %envelope.correlation_id(),
                reason = %reason,
                "Verification failed"
            );
        }

        let reply = Envelope::new(
            &self.name,
            envelope.correlation_id(),
            envelope.session_id(),
            self.answer(&request.file_key, verdict),
        );
        publish_envelope(self.bus.as_ref(), &reply).await
    }
}

/// Worker answering every file with the same verdict
pub struct FixedQualityWorker {
    kind: ResultKind,
    outcome: Result<WorkerVerdict, String>,
}

impl FixedQualityWorker {
    /// Passing when `quality` is at least 0.5
    pub fn new(kind: ResultKind, quality: Decimal) -> Self {
        Self {
            kind,
            outcome: Ok(WorkerVerdict {
                quality,
                passed: quality >= Decimal::new(5, 1),
                fields: OcrFields::default(),
            }),
        }
    }

    pub fn with_fields(mut self, fields: OcrFields) -> Self {
        if let Ok(verdict) = &mut self.outcome {
            verdict.fields = fields;
        }
        self
    }

    /// Worker that always reports `reason`
    pub fn failing(kind: ResultKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            outcome: Err(reason.into()),
        }
    }
}

#[async_trait]
impl VerificationWorker for FixedQualityWorker {
    fn kind(&self) -> ResultKind {
        self.kind
    }

    async fn verify(&self, _file_key: &str) -> Result<WorkerVerdict, String> {
        self.outcome.clone()
    }
}
