//! Write transaction

use crate::error::{StoreError, StoreResult};
use crate::models::{Artifact, AuditEntry, DecisionRecord, PersonPii, ResultRecord, Session};
use crate::store::{decision_from_row, fetch_session, result_from_row, ts};
use chrono::Utc;
use ekyc_core::ResultKind;
use sqlx::{Row, Sqlite, Transaction};

/// A unit of work against the store
///
/// Dropping a `StoreTx` without calling [`StoreTx::commit`] rolls it back.
pub struct StoreTx {
    tx: Transaction<'static, Sqlite>,
}

impl StoreTx {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    pub async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    pub async fn user_exists(&mut self, user_id: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.is_some())
    }

    /// Read a session inside this transaction
    pub async fn get_session(&mut self, id: &str) -> StoreResult<Option<Session>> {
        fetch_session(&mut *self.tx, id).await
    }

    pub async fn insert_session(&mut self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions
                (id, user_id, status, score, pending_steps, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(session.status.as_str())
        .bind(session.score.map(|s| s.to_string()))
        .bind(serde_json::to_string(&session.pending_steps)?)
        .bind(session.version)
        .bind(ts(&session.created_at))
        .bind(ts(&session.updated_at))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// Persist status, score and pending steps.
    ///
    /// Succeeds only if the stored version still equals `session.version`;
    /// on success the version is bumped and `updated_at` refreshed.
    pub async fn update_session(&mut self, session: &mut Session) -> StoreResult<()> {
        let updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = ?, score = ?, pending_steps = ?, version = version + 1, updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(session.status.as_str())
        .bind(session.score.map(|s| s.to_string()))
        .bind(serde_json::to_string(&session.pending_steps)?)
        .bind(ts(&updated_at))
        .bind(&session.id)
        .bind(session.version)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(StoreError::VersionConflict {
                session_id: session.id.clone(),
                expected: session.version,
            });
        }

        session.version += 1;
        session.updated_at = updated_at;
        Ok(())
    }

    pub async fn insert_artifact(&mut self, artifact: &Artifact) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO artifacts (id, session_id, artifact_type, file_key, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&artifact.id)
        .bind(&artifact.session_id)
        .bind(artifact.artifact_type.as_str())
        .bind(&artifact.file_key)
        .bind(serde_json::to_string(&artifact.metadata)?)
        .bind(ts(&artifact.created_at))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// Append a result row.
    ///
    /// Returns false when a row with the same (session, kind, event_id)
    /// already exists; the existing row is left untouched.
    pub async fn insert_result(&mut self, record: &ResultRecord) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO results (id, session_id, kind, event_id, quality, payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (session_id, kind, event_id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(&record.session_id)
        .bind(record.kind.as_str())
        .bind(&record.event_id)
        .bind(record.quality.to_string())
        .bind(serde_json::to_string(&record.payload)?)
        .bind(ts(&record.created_at))
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn result_exists(
        &mut self,
        session_id: &str,
        kind: ResultKind,
        event_id: &str,
    ) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM results WHERE session_id = ? AND kind = ? AND event_id = ?",
        )
        .bind(session_id)
        .bind(kind.as_str())
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.is_some())
    }

    /// Newest result row per kind
    pub async fn latest_results(&mut self, session_id: &str) -> StoreResult<Vec<ResultRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM results r
            WHERE r.session_id = ?
              AND r.rowid = (
                SELECT MAX(rowid) FROM results
                WHERE session_id = r.session_id AND kind = r.kind
              )
            ORDER BY r.kind
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(result_from_row).collect()
    }

    pub async fn upsert_pii(&mut self, pii: &PersonPii) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO person_pii
                (session_id, full_name, date_of_birth, document_number, nationality, address,
                 updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (session_id) DO UPDATE SET
                full_name = excluded.full_name,
                date_of_birth = excluded.date_of_birth,
                document_number = excluded.document_number,
                nationality = excluded.nationality,
                address = excluded.address,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&pii.session_id)
        .bind(&pii.full_name)
        .bind(pii.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(&pii.document_number)
        .bind(&pii.nationality)
        .bind(&pii.address)
        .bind(ts(&pii.updated_at))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    pub async fn insert_decision(&mut self, decision: &DecisionRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO decisions
                (id, session_id, status, score, reasons, decided_by, note, created_at, published)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&decision.id)
        .bind(&decision.session_id)
        .bind(decision.status.as_str())
        .bind(decision.score.map(|s| s.to_string()))
        .bind(serde_json::to_string(&decision.reasons)?)
        .bind(&decision.decided_by)
        .bind(&decision.note)
        .bind(ts(&decision.created_at))
        .bind(decision.published)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// The current decision, read inside this transaction
    pub async fn latest_decision(
        &mut self,
        session_id: &str,
    ) -> StoreResult<Option<DecisionRecord>> {
        let row = sqlx::query(
            "SELECT * FROM decisions WHERE session_id = ? ORDER BY rowid DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(decision_from_row).transpose()
    }

    pub async fn insert_audit(&mut self, entry: &AuditEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log
                (id, session_id, action, actor, correlation_id, details, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.session_id)
        .bind(&entry.action)
        .bind(&entry.actor)
        .bind(&entry.correlation_id)
        .bind(serde_json::to_string(&entry.details)?)
        .bind(ts(&entry.created_at))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// Number of result rows for a session, all kinds
    pub async fn count_results(&mut self, session_id: &str) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM results WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.get("n"))
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{Artifact, AuditEntry, DecisionRecord, PersonPii, ResultRecord, Session};
    use crate::{SessionFilter, SessionStore, StoreError};
    use chrono::{NaiveDate, Utc};
    use ekyc_core::{ArtifactType, DecisionStatus, ResultKind, SessionStatus, Step};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::time::Duration;

    async fn store_with_session() -> (SessionStore, Session) {
        let store = SessionStore::in_memory().await.unwrap();
        store.register_user("u1", "u1@example.com").await.unwrap();

        let session = Session::new("u1");
        let mut tx = store.begin().await.unwrap();
        tx.insert_session(&session).await.unwrap();
        tx.commit().await.unwrap();

        (store, session)
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let (store, session) = store_with_session().await;

        let loaded = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert!(store.get_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_user() {
        let store = SessionStore::in_memory().await.unwrap();
        store.register_user("u1", "a@example.com").await.unwrap();
        let err = store.register_user("u1", "b@example.com").await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_update_bumps_version() {
        let (store, mut session) = store_with_session().await;

        session.complete_step(Step::Document);
        session.advance_to(SessionStatus::DocUploaded);

        let mut tx = store.begin().await.unwrap();
        tx.update_session(&mut session).await.unwrap();
        tx.commit().await.unwrap();

        let loaded = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.status, SessionStatus::DocUploaded);
        assert_eq!(loaded.pending_steps, vec![Step::Selfie, Step::Liveness]);
        assert!(loaded.updated_at >= loaded.created_at);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let (store, session) = store_with_session().await;
        let mut first = session.clone();
        let mut stale = session.clone();

        let mut tx = store.begin().await.unwrap();
        tx.update_session(&mut first).await.unwrap();
        tx.commit().await.unwrap();

        stale.advance_to(SessionStatus::Approved);
        let mut tx = store.begin().await.unwrap();
        let err = tx.update_session(&mut stale).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 0, .. }));
        tx.rollback().await.unwrap();

        let loaded = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Created);
    }

    #[tokio::test]
    async fn test_uncommitted_tx_rolls_back() {
        let (store, session) = store_with_session().await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_artifact(&Artifact::new(
                &session.id,
                ArtifactType::Document,
                "doc.jpg",
                json!({}),
            ))
            .await
            .unwrap();
        }

        assert!(store.list_artifacts(&session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_result_dedup_and_latest() {
        let (store, session) = store_with_session().await;
        let mut tx = store.begin().await.unwrap();

        let first = ResultRecord::new(&session.id, ResultKind::Ocr, "e1", dec!(0.4), json!({}));
        let replay = ResultRecord::new(&session.id, ResultKind::Ocr, "e1", dec!(0.9), json!({}));
        let retry = ResultRecord::new(&session.id, ResultKind::Ocr, "e2", dec!(0.7), json!({}));
        let face = ResultRecord::new(&session.id, ResultKind::Face, "e3", dec!(0.8), json!({}));

        assert!(tx.insert_result(&first).await.unwrap());
        assert!(!tx.insert_result(&replay).await.unwrap());
        assert!(tx.insert_result(&retry).await.unwrap());
        assert!(tx.insert_result(&face).await.unwrap());
        assert_eq!(tx.count_results(&session.id).await.unwrap(), 3);

        let latest = tx.latest_results(&session.id).await.unwrap();
        assert_eq!(latest.len(), 2);
        let ocr = latest.iter().find(|r| r.kind == ResultKind::Ocr).unwrap();
        assert_eq!(ocr.event_id, "e2");
        assert_eq!(ocr.quality, dec!(0.7));
        tx.commit().await.unwrap();

        assert_eq!(store.list_results(&session.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_pii_upsert() {
        let (store, session) = store_with_session().await;
        let mut pii = PersonPii {
            session_id: session.id.clone(),
            full_name: Some("Jane Roe".to_string()),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17),
            document_number: Some("X123".to_string()),
            nationality: None,
            address: None,
            updated_at: Utc::now(),
        };

        let mut tx = store.begin().await.unwrap();
        tx.upsert_pii(&pii).await.unwrap();
        pii.document_number = Some("X999".to_string());
        tx.upsert_pii(&pii).await.unwrap();
        tx.commit().await.unwrap();

        let loaded = store.get_pii(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.document_number.as_deref(), Some("X999"));
        assert_eq!(loaded.date_of_birth, NaiveDate::from_ymd_opt(1990, 5, 17));
    }

    #[tokio::test]
    async fn test_decisions_newest_first() {
        let (store, session) = store_with_session().await;
        let mut tx = store.begin().await.unwrap();

        for (status, by) in [
            (DecisionStatus::Review, "system"),
            (DecisionStatus::Approved, "admin-1"),
        ] {
            tx.insert_decision(&DecisionRecord {
                id: uuid::Uuid::new_v4().to_string(),
                session_id: session.id.clone(),
                status,
                score: Some(dec!(0.7)),
                reasons: vec!["FACE".to_string()],
                decided_by: by.to_string(),
                note: None,
                created_at: Utc::now(),
                published: false,
            })
            .await
            .unwrap();
        }
        assert_eq!(
            tx.latest_decision(&session.id).await.unwrap().unwrap().decided_by,
            "admin-1"
        );
        tx.commit().await.unwrap();

        let latest = store.latest_decision(&session.id).await.unwrap().unwrap();
        assert_eq!(latest.status, DecisionStatus::Approved);
        assert_eq!(latest.decided_by, "admin-1");
        assert!(!latest.published);

        store.mark_decision_published(&latest.id).await.unwrap();
        let latest = store.latest_decision(&session.id).await.unwrap().unwrap();
        assert!(latest.published);

        let history = store.list_decisions(&session.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].reasons, vec!["FACE".to_string()]);
    }

    #[tokio::test]
    async fn test_open_transaction_does_not_block_other_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("kyc.db")).await.unwrap();
        store.register_user("u1", "u1@example.com").await.unwrap();

        let a = Session::new("u1");
        let b = Session::new("u1");
        let mut tx = store.begin().await.unwrap();
        tx.insert_session(&a).await.unwrap();
        tx.insert_session(&b).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx_a = store.begin().await.unwrap();
        let mut session_a = tx_a.get_session(&a.id).await.unwrap().unwrap();
        session_a.advance_to(SessionStatus::DocUploaded);
        tx_a.update_session(&mut session_a).await.unwrap();

        // Reads of B are served while A's write transaction is open
        let read_b = tokio::time::timeout(Duration::from_secs(2), store.get_session(&b.id))
            .await
            .expect("read of B waited on A's transaction")
            .unwrap()
            .unwrap();
        assert_eq!(read_b.status, SessionStatus::Created);

        // A write to B queues on SQLite's writer lock and lands once A commits
        let writer = {
            let store = store.clone();
            let id = b.id.clone();
            tokio::spawn(async move {
                let mut tx = store.begin().await?;
                let mut session = tx.get_session(&id).await?.unwrap();
                session.advance_to(SessionStatus::DocUploaded);
                tx.update_session(&mut session).await?;
                tx.commit().await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx_a.commit().await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), writer)
            .await
            .expect("write to B never completed")
            .unwrap()
            .unwrap();

        for id in [&a.id, &b.id] {
            let session = store.get_session(id).await.unwrap().unwrap();
            assert_eq!(session.status, SessionStatus::DocUploaded);
        }
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (store, session) = store_with_session().await;
        let mut tx = store.begin().await.unwrap();
        tx.insert_audit(&AuditEntry::new(&session.id, "session.created", "u1", "c1", json!({})))
            .await
            .unwrap();
        tx.insert_result(&ResultRecord::new(
            &session.id,
            ResultKind::Face,
            "e1",
            dec!(0.5),
            json!({}),
        ))
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert!(store.delete_session(&session.id).await.unwrap());
        assert!(store.list_audit(&session.id).await.unwrap().is_empty());
        assert!(store.list_results(&session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_sessions_filter_and_paging() {
        let store = SessionStore::in_memory().await.unwrap();
        store.register_user("u1", "u1@example.com").await.unwrap();
        store.register_user("u2", "u2@example.com").await.unwrap();

        let mut tx = store.begin().await.unwrap();
        for user in ["u1", "u1", "u1", "u2"] {
            tx.insert_session(&Session::new(user)).await.unwrap();
        }
        tx.commit().await.unwrap();

        let filter = SessionFilter {
            user_id: Some("u1".to_string()),
            ..Default::default()
        };
        let page = store.list_sessions(&filter, 1, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.items[0].created_at >= page.items[1].created_at);

        let page2 = store.list_sessions(&filter, 2, 2).await.unwrap();
        assert_eq!(page2.items.len(), 1);

        let by_status = SessionFilter {
            status: Some(SessionStatus::Approved),
            ..Default::default()
        };
        assert_eq!(store.list_sessions(&by_status, 1, 10).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ekyc.db");

        let session_id = {
            let store = SessionStore::open(&path).await.unwrap();
            store.register_user("u1", "u1@example.com").await.unwrap();
            let session = Session::new("u1");
            let mut tx = store.begin().await.unwrap();
            tx.insert_session(&session).await.unwrap();
            tx.commit().await.unwrap();
            session.id
        };

        let reopened = SessionStore::open(&path).await.unwrap();
        assert!(reopened.get_session(&session_id).await.unwrap().is_some());
    }
}
