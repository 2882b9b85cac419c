//! Session state machine tests against a file-backed store and the in-process bus

use async_trait::async_trait;
use ekyc_bus::{
    publish_envelope, BusError, CollectingSubscriber, DeliveryPolicy, EventBus, EventSubscriber,
    InMemoryBus,
};
use ekyc_core::{DecisionStatus, KycError, RequestContext, ResultKind, SessionStatus, Step};
use ekyc_decision::{DecisionConfig, DecisionEngine};
use ekyc_events::{
    Envelope, EventPayload, FaceResult, OcrFields, OcrResult, Subject, WorkerFailure,
};
use ekyc_store::{SessionFilter, SessionStore};
use ekyc_workflow::{
    RecordOutcome, ResultIngestor, ResultInput, SessionWorkflow, UploadRequest, WorkflowError,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    workflow: Arc<SessionWorkflow>,
    bus: InMemoryBus,
    _dir: TempDir,
}

async fn harness() -> Harness {
    harness_with(|bus| Arc::new(bus)).await
}

/// Harness whose workflow and engine publish through `wrap(bus)`
async fn harness_with(wrap: fn(InMemoryBus) -> Arc<dyn EventBus>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(dir.path().join("kyc.db")).await.unwrap();
    store.register_user("u1", "u1@example.com").await.unwrap();

    let bus = InMemoryBus::new(DeliveryPolicy {
        redelivery_delay: Duration::from_millis(10),
        max_deliveries: 3,
    });
    let shared = wrap(bus.clone());
    let engine = Arc::new(
        DecisionEngine::new(DecisionConfig::default(), shared.clone(), "kyc-service").unwrap(),
    );
    let workflow = Arc::new(SessionWorkflow::new(store, shared, engine, "kyc-service"));

    Harness {
        workflow,
        bus,
        _dir: dir,
    }
}

fn ctx() -> RequestContext {
    RequestContext::new("api-gateway").with_user("u1")
}

async fn uploaded_session(workflow: &SessionWorkflow) -> String {
    let created = workflow.create_session(&ctx(), "u1").await.unwrap();
    for step in Step::REQUIRED {
        let key = format!("{}/{}.bin", created.session_id, step);
        workflow
            .upload(&ctx(), step, &UploadRequest::new(&created.session_id, key))
            .await
            .unwrap();
    }
    created.session_id
}

fn result(session_id: &str, kind: ResultKind, quality: Decimal) -> ResultInput {
    ResultInput {
        session_id: session_id.to_string(),
        kind,
        event_id: uuid::Uuid::new_v4().to_string(),
        quality,
        payload: json!({"quality": quality}),
        pii: None,
    }
}

#[tokio::test]
async fn test_create_session_requires_known_user() {
    let h = harness().await;

    let err = h.workflow.create_session(&ctx(), "nobody").await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let err = h.workflow.create_session(&ctx(), "  ").await.unwrap_err();
    assert_eq!(KycError::from(err).code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_uploads_advance_status_forward() {
    let h = harness().await;
    let requests = Arc::new(CollectingSubscriber::new());
    h.bus
        .subscribe("ocr.request", "test", requests.clone())
        .await
        .unwrap();

    let created = h.workflow.create_session(&ctx(), "u1").await.unwrap();
    assert_eq!(created.status, SessionStatus::Created);
    assert_eq!(created.pending_steps, Step::REQUIRED.to_vec());

    let ack = h
        .workflow
        .upload(
            &ctx(),
            Step::Document,
            &UploadRequest::new(&created.session_id, "doc.jpg"),
        )
        .await
        .unwrap();
    assert_eq!(ack.status, SessionStatus::DocUploaded);
    assert_eq!(ack.pending_steps, vec![Step::Selfie, Step::Liveness]);

    assert!(h.bus.wait_idle(Duration::from_secs(1)).await);
    let published = requests.envelopes();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].session_id(), created.session_id);
    assert_eq!(
        published[0].data.as_request().map(|r| r.file_key.as_str()),
        Some("doc.jpg")
    );

    let status = h.workflow.get_status(&created.session_id).await.unwrap();
    assert_eq!(status.status, SessionStatus::DocUploaded);
    assert_eq!(status.score, None);
}

#[tokio::test]
async fn test_out_of_order_upload_is_state_error() {
    let h = harness().await;
    let created = h.workflow.create_session(&ctx(), "u1").await.unwrap();

    let err = h
        .workflow
        .upload(
            &ctx(),
            Step::Selfie,
            &UploadRequest::new(&created.session_id, "selfie.jpg"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::State(_)));

    let status = h.workflow.get_status(&created.session_id).await.unwrap();
    assert_eq!(status.status, SessionStatus::Created);
    assert!(h
        .workflow
        .store()
        .list_artifacts(&created.session_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let h = harness().await;

    let err = h
        .workflow
        .upload(&ctx(), Step::Document, &UploadRequest::new("missing", "doc.jpg"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));

    let err = h.workflow.get_status("missing").await.unwrap_err();
    assert_eq!(KycError::from(err).code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_retake_keeps_status() {
    let h = harness().await;
    let created = h.workflow.create_session(&ctx(), "u1").await.unwrap();
    let id = created.session_id;

    for (step, key) in [(Step::Document, "doc.jpg"), (Step::Selfie, "selfie.jpg")] {
        h.workflow
            .upload(&ctx(), step, &UploadRequest::new(&id, key))
            .await
            .unwrap();
    }

    let ack = h
        .workflow
        .upload(&ctx(), Step::Document, &UploadRequest::new(&id, "doc-2.jpg"))
        .await
        .unwrap();
    assert_eq!(ack.status, SessionStatus::SelfieUploaded);
    assert_eq!(ack.pending_steps, vec![Step::Liveness]);
    assert_eq!(h.workflow.store().list_artifacts(&id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_results_trigger_decision() {
    let h = harness().await;
    let decisions = Arc::new(CollectingSubscriber::new());
    h.bus
        .subscribe("kyc.decision", "test", decisions.clone())
        .await
        .unwrap();

    let id = uploaded_session(&h.workflow).await;
    assert_eq!(
        h.workflow.get_status(&id).await.unwrap().status,
        SessionStatus::LivenessPending
    );

    let first = h
        .workflow
        .record_result(&ctx(), result(&id, ResultKind::Ocr, dec!(0.9)))
        .await
        .unwrap();
    assert_eq!(first, RecordOutcome::Recorded { decision: None });
    h.workflow
        .record_result(&ctx(), result(&id, ResultKind::Face, dec!(0.85)))
        .await
        .unwrap();
    let last = h
        .workflow
        .record_result(&ctx(), result(&id, ResultKind::Liveness, dec!(0.95)))
        .await
        .unwrap();
    assert_eq!(
        last,
        RecordOutcome::Recorded {
            decision: Some(DecisionStatus::Approved)
        }
    );

    let status = h.workflow.get_status(&id).await.unwrap();
    assert_eq!(status.status, SessionStatus::Approved);
    assert_eq!(status.score, Some(dec!(0.895)));

    assert!(h.bus.wait_idle(Duration::from_secs(1)).await);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions.envelopes()[0].subject(), Subject::KycDecision);
}

#[tokio::test]
async fn test_result_for_pending_step_is_rejected() {
    let h = harness().await;
    let created = h.workflow.create_session(&ctx(), "u1").await.unwrap();
    let id = created.session_id;
    h.workflow
        .upload(&ctx(), Step::Document, &UploadRequest::new(&id, "doc.jpg"))
        .await
        .unwrap();

    let ocr = h
        .workflow
        .record_result(&ctx(), result(&id, ResultKind::Ocr, dec!(0.9)))
        .await
        .unwrap();
    assert_eq!(ocr, RecordOutcome::Recorded { decision: None });

    for kind in [ResultKind::Face, ResultKind::Liveness] {
        let err = h
            .workflow
            .record_result(&ctx(), result(&id, kind, dec!(0.9)))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::State(_)));
        assert!(!err.is_retryable());
    }

    let status = h.workflow.get_status(&id).await.unwrap();
    assert_eq!(status.status, SessionStatus::DocUploaded);
    assert_eq!(status.pending_steps, vec![Step::Selfie, Step::Liveness]);
    assert_eq!(status.score, None);

    let store = h.workflow.store();
    assert_eq!(store.list_results(&id).await.unwrap().len(), 1);
    assert!(store.list_decisions(&id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ingestor_acks_result_for_pending_step() {
    let h = harness().await;
    Arc::new(ResultIngestor::new(h.workflow.clone()))
        .subscribe(&h.bus)
        .await
        .unwrap();
    let id = h.workflow.create_session(&ctx(), "u1").await.unwrap().session_id;

    let early = Envelope::new(
        "face-worker",
        "corr-early",
        &id,
        EventPayload::FaceCompleted(FaceResult {
            file_key: "selfie.jpg".to_string(),
            quality: dec!(0.9),
            matched: true,
        }),
    );
    publish_envelope(&h.bus, &early).await.unwrap();

    assert!(h.bus.wait_idle(Duration::from_secs(1)).await);
    assert!(h.workflow.store().list_results(&id).await.unwrap().is_empty());
    assert_eq!(
        h.workflow.get_status(&id).await.unwrap().status,
        SessionStatus::Created
    );
}

#[tokio::test]
async fn test_other_sessions_proceed_while_one_is_busy() {
    let h = harness().await;
    let a = h.workflow.create_session(&ctx(), "u1").await.unwrap().session_id;
    let b = h.workflow.create_session(&ctx(), "u1").await.unwrap().session_id;

    let lock_a = h.workflow.locks().acquire(&a).await;
    let tx_a = h.workflow.store().begin().await.unwrap();

    // B stays readable while A holds its lock and an open transaction
    let status_b = tokio::time::timeout(Duration::from_secs(2), h.workflow.get_status(&b))
        .await
        .expect("status of B waited on A")
        .unwrap();
    assert_eq!(status_b.status, SessionStatus::Created);

    tx_a.rollback().await.unwrap();

    // B can be mutated while A's session lock is still held
    let ctx_b = ctx();
    let req_b = UploadRequest::new(&b, "b/doc.jpg");
    let upload_b = h.workflow.upload(&ctx_b, Step::Document, &req_b);
    let ack = tokio::time::timeout(Duration::from_secs(2), upload_b)
        .await
        .expect("upload to B waited on A's lock")
        .unwrap();
    assert_eq!(ack.status, SessionStatus::DocUploaded);

    // A itself stays serialized behind its lock
    let ctx_a = ctx();
    let req_a = UploadRequest::new(&a, "a/doc.jpg");
    let upload_a = h.workflow.upload(&ctx_a, Step::Document, &req_a);
    assert!(tokio::time::timeout(Duration::from_millis(100), upload_a)
        .await
        .is_err());

    drop(lock_a);
    assert_eq!(
        h.workflow.get_status(&a).await.unwrap().status,
        SessionStatus::Created
    );
}

/// Bus that refuses the first `kyc.decision` publish
struct DecisionOutageBus {
    inner: InMemoryBus,
    failures_left: AtomicU32,
}

#[async_trait]
impl EventBus for DecisionOutageBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if subject == Subject::KycDecision.as_str()
            && self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(BusError::PublishFailed {
                subject: subject.to_string(),
                reason: "broker unreachable".to_string(),
            });
        }
        self.inner.publish(subject, payload).await
    }

    async fn subscribe(
        &self,
        subject: &str,
        group: &str,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> Result<(), BusError> {
        self.inner.subscribe(subject, group, subscriber).await
    }
}

#[tokio::test]
async fn test_unpublished_decision_goes_out_on_redelivery() {
    let h = harness_with(|bus| {
        Arc::new(DecisionOutageBus {
            inner: bus,
            failures_left: AtomicU32::new(1),
        })
    })
    .await;
    let decisions = Arc::new(CollectingSubscriber::new());
    h.bus
        .subscribe("kyc.decision", "test", decisions.clone())
        .await
        .unwrap();
    let id = uploaded_session(&h.workflow).await;

    for (kind, quality) in [(ResultKind::Ocr, dec!(0.9)), (ResultKind::Face, dec!(0.85))] {
        h.workflow
            .record_result(&ctx(), result(&id, kind, quality))
            .await
            .unwrap();
    }
    let completing = result(&id, ResultKind::Liveness, dec!(0.95));
    let err = h
        .workflow
        .record_result(&ctx(), completing.clone())
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let store = h.workflow.store();
    let stored = store.latest_decision(&id).await.unwrap().unwrap();
    assert!(!stored.published);
    assert_eq!(
        h.workflow.get_status(&id).await.unwrap().status,
        SessionStatus::Approved
    );
    assert!(h.bus.wait_idle(Duration::from_secs(1)).await);
    assert!(decisions.is_empty());

    // Redelivery of the completing result announces the stored decision
    let again = h
        .workflow
        .record_result(&ctx(), completing.clone())
        .await
        .unwrap();
    assert_eq!(again, RecordOutcome::Duplicate);
    assert!(h.bus.wait_idle(Duration::from_secs(1)).await);

    let published = decisions.envelopes();
    assert_eq!(published.len(), 1);
    match &published[0].data {
        EventPayload::Decision(event) => {
            assert_eq!(event.decision_id, stored.id);
            assert_eq!(event.status, DecisionStatus::Approved);
        }
        other => panic!("unexpected payload {:?}", other),
    }
    assert!(store.latest_decision(&id).await.unwrap().unwrap().published);
    assert_eq!(store.list_decisions(&id).await.unwrap().len(), 1);

    // Once published, further redeliveries stay silent
    h.workflow.record_result(&ctx(), completing).await.unwrap();
    assert!(h.bus.wait_idle(Duration::from_secs(1)).await);
    assert_eq!(decisions.len(), 1);
}

#[tokio::test]
async fn test_duplicate_event_is_discarded() {
    let h = harness().await;
    let id = uploaded_session(&h.workflow).await;

    let input = result(&id, ResultKind::Ocr, dec!(0.9));
    let first = h.workflow.record_result(&ctx(), input.clone()).await.unwrap();
    let second = h.workflow.record_result(&ctx(), input).await.unwrap();

    assert_eq!(first, RecordOutcome::Recorded { decision: None });
    assert_eq!(second, RecordOutcome::Duplicate);
    assert_eq!(h.workflow.store().list_results(&id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_quality_out_of_range_is_rejected() {
    let h = harness().await;
    let id = uploaded_session(&h.workflow).await;

    let err = h
        .workflow
        .record_result(&ctx(), result(&id, ResultKind::Face, dec!(1.2)))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
    assert!(!err.is_retryable());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_decision_fires_once_under_concurrency() {
    let h = harness().await;
    let id = uploaded_session(&h.workflow).await;

    let mut inputs = Vec::new();
    for (kind, quality) in [
        (ResultKind::Liveness, dec!(0.95)),
        (ResultKind::Ocr, dec!(0.9)),
        (ResultKind::Face, dec!(0.85)),
    ] {
        let input = result(&id, kind, quality);
        inputs.push(input.clone());
        inputs.push(input);
    }
    // A retry of OCR under a fresh event id
    inputs.push(result(&id, ResultKind::Ocr, dec!(0.9)));

    let mut handles = Vec::new();
    for input in inputs {
        let workflow = h.workflow.clone();
        handles.push(tokio::spawn(async move {
            workflow.record_result(&ctx(), input).await
        }));
    }

    let mut decided = 0;
    for handle in handles {
        if let RecordOutcome::Recorded { decision: Some(_) } = handle.await.unwrap().unwrap() {
            decided += 1;
        }
    }

    assert_eq!(decided, 1);
    let decisions = h.workflow.store().list_decisions(&id).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].status, DecisionStatus::Approved);
    assert!(h.workflow.locks().is_empty());
}

#[tokio::test]
async fn test_late_result_is_recorded_as_anomaly() {
    let h = harness().await;
    let id = uploaded_session(&h.workflow).await;
    for (kind, quality) in [
        (ResultKind::Ocr, dec!(0.9)),
        (ResultKind::Face, dec!(0.85)),
        (ResultKind::Liveness, dec!(0.95)),
    ] {
        h.workflow
            .record_result(&ctx(), result(&id, kind, quality))
            .await
            .unwrap();
    }

    let late = h
        .workflow
        .record_result(&ctx(), result(&id, ResultKind::Face, dec!(0.1)))
        .await
        .unwrap();
    assert_eq!(late, RecordOutcome::Late);

    let detail = h.workflow.get_session_detail(&id).await.unwrap();
    assert_eq!(detail.session.status, SessionStatus::Approved);
    assert_eq!(detail.results.len(), 3);
    assert_eq!(detail.decisions.len(), 1);
    assert!(detail.audit.iter().any(|a| a.action == "result.late"));
}

#[tokio::test]
async fn test_terminal_session_rejects_uploads() {
    let h = harness().await;
    let id = uploaded_session(&h.workflow).await;
    for kind in [ResultKind::Ocr, ResultKind::Face, ResultKind::Liveness] {
        h.workflow
            .record_result(&ctx(), result(&id, kind, dec!(0.2)))
            .await
            .unwrap();
    }
    assert_eq!(
        h.workflow.get_status(&id).await.unwrap().status,
        SessionStatus::Rejected
    );

    let err = h
        .workflow
        .upload(&ctx(), Step::Document, &UploadRequest::new(&id, "again.jpg"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::State(_)));
}

#[tokio::test]
async fn test_admin_decision_rules() {
    let h = harness().await;
    let admin = RequestContext::new("admin-console");

    let created = h.workflow.create_session(&ctx(), "u1").await.unwrap();
    let err = h
        .workflow
        .apply_admin_decision(
            &admin,
            &created.session_id,
            DecisionStatus::Approved,
            "looks fine",
            "admin-1",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::State(_)));

    let id = uploaded_session(&h.workflow).await;
    for (kind, quality) in [
        (ResultKind::Ocr, dec!(0.9)),
        (ResultKind::Face, dec!(0.5)),
        (ResultKind::Liveness, dec!(0.8)),
    ] {
        h.workflow
            .record_result(&ctx(), result(&id, kind, quality))
            .await
            .unwrap();
    }
    assert_eq!(
        h.workflow.get_status(&id).await.unwrap().status,
        SessionStatus::UnderReview
    );

    let err = h
        .workflow
        .apply_admin_decision(&admin, &id, DecisionStatus::Review, "", "admin-1")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let ack = h
        .workflow
        .apply_admin_decision(&admin, &id, DecisionStatus::Approved, "manual check", "admin-1")
        .await
        .unwrap();
    assert_eq!(ack.status, SessionStatus::Approved);

    let ack = h
        .workflow
        .apply_admin_decision(&admin, &id, DecisionStatus::Rejected, "fraud flag", "admin-2")
        .await
        .unwrap();
    assert_eq!(ack.status, SessionStatus::Rejected);

    let detail = h.workflow.get_session_detail(&id).await.unwrap();
    assert_eq!(detail.decisions.len(), 3);
    assert_eq!(detail.decisions[0].decided_by, "admin-2");
    assert_eq!(detail.decisions[0].note.as_deref(), Some("fraud flag"));
    assert_eq!(
        detail
            .audit
            .iter()
            .filter(|a| a.action == "decision.admin")
            .count(),
        2
    );
}

#[tokio::test]
async fn test_list_sessions() {
    let h = harness().await;
    let first = h.workflow.create_session(&ctx(), "u1").await.unwrap();
    let second = h.workflow.create_session(&ctx(), "u1").await.unwrap();

    let page = h
        .workflow
        .list_sessions(&SessionFilter::default(), 1, 10)
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].id, second.session_id);
    assert_eq!(page.items[1].id, first.session_id);

    let filter = SessionFilter {
        status: Some(SessionStatus::Approved),
        user_id: None,
    };
    let page = h.workflow.list_sessions(&filter, 1, 10).await.unwrap();
    assert_eq!(page.total, 0);

    for (page, size) in [(0, 10), (1, 0), (1, 101)] {
        let err = h
            .workflow
            .list_sessions(&SessionFilter::default(), page, size)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }
}

#[tokio::test]
async fn test_ingestor_deduplicates_redelivered_events() {
    let h = harness().await;
    Arc::new(ResultIngestor::new(h.workflow.clone()))
        .subscribe(&h.bus)
        .await
        .unwrap();
    let id = uploaded_session(&h.workflow).await;

    let envelope = Envelope::new(
        "ocr-worker",
        "corr-1",
        &id,
        EventPayload::OcrCompleted(OcrResult {
            file_key: "doc.jpg".to_string(),
            quality: dec!(0.9),
            fields: OcrFields {
                full_name: Some("Nguyen Van A".to_string()),
                document_number: Some("012345678".to_string()),
                ..Default::default()
            },
        }),
    );
    publish_envelope(&h.bus, &envelope).await.unwrap();
    publish_envelope(&h.bus, &envelope).await.unwrap();
    assert!(h.bus.wait_idle(Duration::from_secs(2)).await);

    let store = h.workflow.store();
    let results = store.list_results(&id).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].event_id, envelope.event_id());

    let pii = store.get_pii(&id).await.unwrap().unwrap();
    assert_eq!(pii.full_name.as_deref(), Some("Nguyen Van A"));

    let recorded = store.list_audit(&id).await.unwrap();
    let entry = recorded
        .iter()
        .find(|a| a.action == "result.recorded")
        .unwrap();
    assert_eq!(entry.correlation_id, "corr-1");
    assert_eq!(entry.actor, "ocr-worker");
}

#[tokio::test]
async fn test_ingestor_records_worker_failure() {
    let h = harness().await;
    Arc::new(ResultIngestor::new(h.workflow.clone()))
        .subscribe(&h.bus)
        .await
        .unwrap();
    let dead_letters = Arc::new(CollectingSubscriber::new());
    h.bus
        .subscribe("face.error.dlq", "ops", dead_letters.clone())
        .await
        .unwrap();
    let id = uploaded_session(&h.workflow).await;

    let failure = Envelope::new(
        "face-worker",
        "corr-2",
        &id,
        EventPayload::failure(WorkerFailure {
            kind: ResultKind::Face,
            file_key: "selfie.jpg".to_string(),
            reason: "no face detected".to_string(),
        }),
    );
    publish_envelope(&h.bus, &failure).await.unwrap();
    assert!(h.bus.wait_idle(Duration::from_secs(2)).await);

    let audit = h.workflow.store().list_audit(&id).await.unwrap();
    assert!(audit.iter().any(|a| a.action == "worker.failed"));
    assert_eq!(dead_letters.len(), 1);
    assert_eq!(
        h.workflow.get_status(&id).await.unwrap().status,
        SessionStatus::LivenessPending
    );
}

#[tokio::test]
async fn test_ingestor_acks_result_for_unknown_session() {
    let h = harness().await;
    Arc::new(ResultIngestor::new(h.workflow.clone()))
        .subscribe(&h.bus)
        .await
        .unwrap();

    let envelope = Envelope::new(
        "face-worker",
        "corr-3",
        "missing",
        EventPayload::FaceCompleted(FaceResult {
            file_key: "selfie.jpg".to_string(),
            quality: dec!(0.8),
            matched: true,
        }),
    );
    publish_envelope(&h.bus, &envelope).await.unwrap();

    assert!(h.bus.wait_idle(Duration::from_secs(1)).await);
    assert_eq!(h.bus.in_flight(), 0);
}
