//! Schema definition
//!
//! Enum columns hold the exact wire values of the core enums. Decimals and
//! timestamps are stored as TEXT (decimal string / RFC 3339, UTC).

use sqlx::SqlitePool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        status TEXT NOT NULL CHECK (status IN (
            'CREATED', 'DOC_UPLOADED', 'SELFIE_UPLOADED', 'LIVENESS_PENDING',
            'UNDER_REVIEW', 'APPROVED', 'REJECTED'
        )),
        score TEXT,
        pending_steps TEXT NOT NULL,
        version INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_sessions_user
    ON sessions(user_id, created_at)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_sessions_status
    ON sessions(status, created_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS person_pii (
        session_id TEXT PRIMARY KEY REFERENCES sessions(id) ON DELETE CASCADE,
        full_name TEXT,
        date_of_birth TEXT,
        document_number TEXT,
        nationality TEXT,
        address TEXT,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS artifacts (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        artifact_type TEXT NOT NULL CHECK (artifact_type IN (
            'DOCUMENT', 'SELFIE', 'LIVENESS_VIDEO'
        )),
        file_key TEXT NOT NULL,
        metadata TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS results (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        kind TEXT NOT NULL CHECK (kind IN ('OCR', 'FACE', 'LIVENESS')),
        event_id TEXT NOT NULL,
        quality TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (session_id, kind, event_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS decisions (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        status TEXT NOT NULL CHECK (status IN ('APPROVED', 'REVIEW', 'REJECTED')),
        score TEXT,
        reasons TEXT NOT NULL,
        decided_by TEXT NOT NULL,
        note TEXT,
        created_at TEXT NOT NULL,
        published INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        action TEXT NOT NULL,
        actor TEXT NOT NULL,
        correlation_id TEXT NOT NULL,
        details TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_audit_session
    ON audit_log(session_id, created_at)
    "#,
];

/// Create all tables and indexes if they do not exist
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
