//! Durable store for submissions and answers
//!
//! SQLite via sqlx. The unique index on `submissions.token` is what makes
//! concurrent duplicate deliveries safe; the lookup in
//! [`SubmissionStore::persist`] only saves a round trip on retries.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

mod submissions;
pub use submissions::{
    PersistedSubmission, PersistenceError, StoredAnswer, StoredSubmission, SubmissionStore,
};

/// Initialize database connection pool
///
/// Creates the parent directory and the database file if missing, then
/// ensures the schema exists.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url)
        .await
        .context("Failed to open submission database")?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create tables and indexes if they don't exist
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            token TEXT NOT NULL,
            form_id TEXT NOT NULL,
            form_title TEXT,
            submitted_at TEXT NOT NULL,
            received_at TEXT NOT NULL,
            raw_payload TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Idempotency key - must be enforced by the store, not only by the lookup
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_submissions_token ON submissions(token)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS answers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            submission_id INTEGER NOT NULL REFERENCES submissions(id),
            question_id TEXT NOT NULL,
            question_label TEXT NOT NULL,
            question_ref TEXT,
            answer_kind TEXT NOT NULL,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_answers_submission ON answers(submission_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (submissions, answers)");

    Ok(())
}
