//! Session store - pool, read queries and row decoding

use crate::error::{StoreError, StoreResult};
use crate::models::{
    Artifact, AuditEntry, DecisionRecord, PersonPii, ResultRecord, Session, SessionFilter,
    SessionPage, User,
};
use crate::schema;
use crate::tx::StoreTx;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use ekyc_core::Step;
use rust_decimal::Decimal;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Connections in a file-backed pool
pub const MAX_CONNECTIONS: u32 = 8;

/// How long a writer waits for SQLite's write lock
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable session store backed by SQLite
///
/// File databases run in WAL mode: readers never wait on an open write
/// transaction, and writers queue on SQLite's single write lock for at most
/// [`BUSY_TIMEOUT`]. An in-memory database keeps one connection.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    /// Connect to a database URL (`sqlite:path.db`, `sqlite::memory:`) and
    /// create the schema
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { MAX_CONNECTIONS })
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Open (or create) a database file
    pub async fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::connect(&format!("sqlite:{}", db_path.as_ref().display())).await
    }

    /// Private in-memory database
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Initialize the schema
    pub async fn init(&self) -> StoreResult<()> {
        schema::migrate(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a write transaction.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front, so a transaction that
    /// reads before writing cannot fail on lock upgrade.
    pub async fn begin(&self) -> StoreResult<StoreTx> {
        Ok(StoreTx::new(self.pool.begin_with("BEGIN IMMEDIATE").await?))
    }

    /// Register an end user (seeding; credentials live elsewhere)
    pub async fn register_user(&self, id: &str, email: &str) -> StoreResult<User> {
        let user = User {
            id: id.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };

        let result = sqlx::query("INSERT INTO users (id, email, created_at) VALUES (?, ?, ?)")
            .bind(&user.id)
            .bind(&user.email)
            .bind(ts(&user.created_at))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate(format!("user {}", id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT id, email, created_at FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(User {
                id: row.get("id"),
                email: row.get("email"),
                created_at: parse_ts(row.get("created_at"))?,
            })
        })
        .transpose()
    }

    pub async fn get_session(&self, id: &str) -> StoreResult<Option<Session>> {
        fetch_session(&self.pool, id).await
    }

    /// One page of sessions matching `filter`, newest first. `page` is 1-based.
    pub async fn list_sessions(
        &self,
        filter: &SessionFilter,
        page: u32,
        size: u32,
    ) -> StoreResult<SessionPage> {
        let status = filter.status.map(|s| s.as_str().to_string());
        let offset = i64::from(page.saturating_sub(1)) * i64::from(size);

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total FROM sessions
            WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR user_id = ?2)
            "#,
        )
        .bind(&status)
        .bind(&filter.user_id)
        .fetch_one(&self.pool)
        .await?
        .get("total");

        let rows = sqlx::query(
            r#"
            SELECT * FROM sessions
            WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR user_id = ?2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(&status)
        .bind(&filter.user_id)
        .bind(i64::from(size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(session_from_row)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(SessionPage {
            items,
            total: total.max(0) as u64,
            page,
            size,
        })
    }

    pub async fn get_pii(&self, session_id: &str) -> StoreResult<Option<PersonPii>> {
        let row = sqlx::query("SELECT * FROM person_pii WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(pii_from_row).transpose()
    }

    /// Artifacts in upload order
    pub async fn list_artifacts(&self, session_id: &str) -> StoreResult<Vec<Artifact>> {
        let rows = sqlx::query("SELECT * FROM artifacts WHERE session_id = ? ORDER BY rowid")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(artifact_from_row).collect()
    }

    /// Every result row, in arrival order
    pub async fn list_results(&self, session_id: &str) -> StoreResult<Vec<ResultRecord>> {
        let rows = sqlx::query("SELECT * FROM results WHERE session_id = ? ORDER BY rowid")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(result_from_row).collect()
    }

    /// Decision history, newest first
    pub async fn list_decisions(&self, session_id: &str) -> StoreResult<Vec<DecisionRecord>> {
        let rows =
            sqlx::query("SELECT * FROM decisions WHERE session_id = ? ORDER BY rowid DESC")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(decision_from_row).collect()
    }

    /// The current decision
    pub async fn latest_decision(&self, session_id: &str) -> StoreResult<Option<DecisionRecord>> {
        let row = sqlx::query(
            "SELECT * FROM decisions WHERE session_id = ? ORDER BY rowid DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decision_from_row).transpose()
    }

    /// Flag a committed decision as delivered to the bus
    pub async fn mark_decision_published(&self, decision_id: &str) -> StoreResult<()> {
        sqlx::query("UPDATE decisions SET published = 1 WHERE id = ?")
            .bind(decision_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Audit trail, oldest first
    pub async fn list_audit(&self, session_id: &str) -> StoreResult<Vec<AuditEntry>> {
        let rows = sqlx::query("SELECT * FROM audit_log WHERE session_id = ? ORDER BY rowid")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(audit_from_row).collect()
    }

    /// Delete a session and, through the foreign keys, everything it owns
    pub async fn delete_session(&self, session_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

pub(crate) async fn fetch_session<'e, E>(executor: E, id: &str) -> StoreResult<Option<Session>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Fixed-width UTC timestamp so TEXT ordering matches time ordering
pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(value: String) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::corrupt("timestamp", &value))
}

fn parse_decimal(column: &str, value: String) -> StoreResult<Decimal> {
    Decimal::from_str(&value).map_err(|_| StoreError::corrupt(column, &value))
}

fn parse_enum<T: FromStr>(column: &str, value: String) -> StoreResult<T> {
    T::from_str(&value).map_err(|_| StoreError::corrupt(column, &value))
}

pub(crate) fn session_from_row(row: &SqliteRow) -> StoreResult<Session> {
    let pending: Vec<Step> = serde_json::from_str(&row.get::<String, _>("pending_steps"))?;
    let score: Option<String> = row.get("score");

    Ok(Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        status: parse_enum("status", row.get("status"))?,
        score: score.map(|s| parse_decimal("score", s)).transpose()?,
        pending_steps: pending,
        version: row.get("version"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

fn pii_from_row(row: &SqliteRow) -> StoreResult<PersonPii> {
    let dob: Option<String> = row.get("date_of_birth");
    let date_of_birth = dob
        .map(|d| {
            NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                .map_err(|_| StoreError::corrupt("date_of_birth", &d))
        })
        .transpose()?;

    Ok(PersonPii {
        session_id: row.get("session_id"),
        full_name: row.get("full_name"),
        date_of_birth,
        document_number: row.get("document_number"),
        nationality: row.get("nationality"),
        address: row.get("address"),
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

fn artifact_from_row(row: &SqliteRow) -> StoreResult<Artifact> {
    Ok(Artifact {
        id: row.get("id"),
        session_id: row.get("session_id"),
        artifact_type: parse_enum("artifact_type", row.get("artifact_type"))?,
        file_key: row.get("file_key"),
        metadata: serde_json::from_str(&row.get::<String, _>("metadata"))?,
        created_at: parse_ts(row.get("created_at"))?,
    })
}

pub(crate) fn result_from_row(row: &SqliteRow) -> StoreResult<ResultRecord> {
    Ok(ResultRecord {
        id: row.get("id"),
        session_id: row.get("session_id"),
        kind: parse_enum("kind", row.get("kind"))?,
        event_id: row.get("event_id"),
        quality: parse_decimal("quality", row.get("quality"))?,
        payload: serde_json::from_str(&row.get::<String, _>("payload"))?,
        created_at: parse_ts(row.get("created_at"))?,
    })
}

pub(crate) fn decision_from_row(row: &SqliteRow) -> StoreResult<DecisionRecord> {
    let score: Option<String> = row.get("score");

    Ok(DecisionRecord {
        id: row.get("id"),
        session_id: row.get("session_id"),
        status: parse_enum("status", row.get("status"))?,
        score: score.map(|s| parse_decimal("score", s)).transpose()?,
        reasons: serde_json::from_str(&row.get::<String, _>("reasons"))?,
        decided_by: row.get("decided_by"),
        note: row.get("note"),
        created_at: parse_ts(row.get("created_at"))?,
        published: row.get("published"),
    })
}

fn audit_from_row(row: &SqliteRow) -> StoreResult<AuditEntry> {
    Ok(AuditEntry {
        id: row.get("id"),
        session_id: row.get("session_id"),
        action: row.get("action"),
        actor: row.get("actor"),
        correlation_id: row.get("correlation_id"),
        details: serde_json::from_str(&row.get::<String, _>("details"))?,
        created_at: parse_ts(row.get("created_at"))?,
    })
}
