//! Idempotent submission writer
//!
//! Persistence has two tiers:
//! - The submission row (with the full raw payload) is mandatory. Failing
//!   to look it up or insert it fails the delivery, and the provider retries.
//! - Answer rows are derived data. Failing to insert them is logged and
//!   swallowed; they can be rebuilt from `raw_payload`.

use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use surveyhook_common::models::{NewSubmission, NormalizedAnswer};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Mandatory persistence failure
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Submission lookup failed: {0}")]
    Lookup(#[source] sqlx::Error),

    #[error("Submission insert failed: {0}")]
    Insert(#[source] sqlx::Error),

    #[error("Raw payload could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Durable store did not respond within {0:?}")]
    Timeout(std::time::Duration),
}

/// Result of a successful persist call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSubmission {
    /// Store-assigned identity
    pub id: i64,
    pub token: String,
    /// `false` when the token was already stored (retried delivery)
    pub created: bool,
    pub answers_inserted: usize,
    /// Set when the answer batch failed; the submission row still stands
    pub answer_failure: Option<String>,
}

impl PersistedSubmission {
    /// Fold the answer batch result in; a failure is logged and kept as text
    pub fn record_answers(&mut self, result: Result<usize, String>) {
        match result {
            Ok(count) => {
                debug!(submission_id = self.id, answers_inserted = count, "Answers stored");
                self.answers_inserted = count;
            }
            Err(reason) => {
                warn!(
                    token = %self.token,
                    submission_id = self.id,
                    error = %reason,
                    "Answer insert failed; submission kept, answers recoverable from raw payload"
                );
                self.answers_inserted = 0;
                self.answer_failure = Some(reason);
            }
        }
    }
}

/// Submission row as read back from the store
#[derive(Debug, Clone)]
pub struct StoredSubmission {
    pub id: i64,
    pub token: String,
    pub form_id: String,
    pub form_title: Option<String>,
    pub submitted_at: String,
    pub received_at: String,
    pub raw_payload: String,
}

/// Answer row as read back from the store
#[derive(Debug, Clone)]
pub struct StoredAnswer {
    pub question_id: String,
    pub question_label: String,
    pub question_ref: Option<String>,
    pub answer_kind: String,
    pub value: String,
}

/// Durable store writer over an injected pool
#[derive(Debug, Clone)]
pub struct SubmissionStore {
    pool: SqlitePool,
}

impl SubmissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persist a submission exactly once per token
    ///
    /// 1. Existing token → return its identity, write nothing
    /// 2. Insert the submission (`ON CONFLICT DO NOTHING`); a lost race with
    ///    a concurrent duplicate re-reads the winner's identity
    /// 3. Insert answers; failures are logged, never returned
    pub async fn persist(
        &self,
        submission: &NewSubmission,
        answers: &[NormalizedAnswer],
    ) -> Result<PersistedSubmission, PersistenceError> {
        let mut persisted = self.persist_submission(submission).await?;
        if persisted.created {
            let result = self
                .insert_answers(persisted.id, answers)
                .await
                .map_err(|e| e.to_string());
            persisted.record_answers(result);
        }
        Ok(persisted)
    }

    /// Steps 1 and 2 of [`persist`](Self::persist): the mandatory part
    ///
    /// Once this returns `Ok` the submission row is committed. Answers are
    /// left to [`insert_answers`](Self::insert_answers).
    pub async fn persist_submission(
        &self,
        submission: &NewSubmission,
    ) -> Result<PersistedSubmission, PersistenceError> {
        if let Some(id) = self.lookup_id(&submission.token).await? {
            debug!(token = %submission.token, id, "Submission already stored");
            return Ok(existing(id, &submission.token));
        }

        let raw_payload = serde_json::to_string(&submission.raw_payload)?;

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO submissions (
                token, form_id, form_title, submitted_at, received_at, raw_payload
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(token) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&submission.token)
        .bind(&submission.form_id)
        .bind(&submission.form_title)
        .bind(submission.submitted_at.to_rfc3339())
        .bind(submission.received_at.to_rfc3339())
        .bind(&raw_payload)
        .fetch_optional(&self.pool)
        .await
        .map_err(PersistenceError::Insert)?;

        let Some(id) = inserted else {
            // A concurrent delivery of the same token committed first
            let id = self
                .lookup_id(&submission.token)
                .await?
                .ok_or_else(|| PersistenceError::Insert(sqlx::Error::RowNotFound))?;
            debug!(token = %submission.token, id, "Lost insert race to duplicate delivery");
            return Ok(existing(id, &submission.token));
        };

        info!(token = %submission.token, submission_id = id, "Submission stored");

        Ok(PersistedSubmission {
            id,
            token: submission.token.clone(),
            created: true,
            answers_inserted: 0,
            answer_failure: None,
        })
    }

    async fn lookup_id(&self, token: &str) -> Result<Option<i64>, PersistenceError> {
        sqlx::query_scalar("SELECT id FROM submissions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(PersistenceError::Lookup)
    }

    /// Insert all answers as a single statement
    pub async fn insert_answers(
        &self,
        submission_id: i64,
        answers: &[NormalizedAnswer],
    ) -> Result<usize, sqlx::Error> {
        if answers.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO answers (submission_id, question_id, question_label, question_ref, answer_kind, value) ",
        );
        builder.push_values(answers, |mut row, answer| {
            row.push_bind(submission_id)
                .push_bind(&answer.question_id)
                .push_bind(&answer.question_label)
                .push_bind(&answer.question_ref)
                .push_bind(answer.kind.as_str())
                .push_bind(&answer.value);
        });

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }

    /// Read a submission back by token
    pub async fn find_by_token(&self, token: &str) -> Result<Option<StoredSubmission>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, token, form_id, form_title, submitted_at, received_at, raw_payload
            FROM submissions
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| StoredSubmission {
            id: row.get("id"),
            token: row.get("token"),
            form_id: row.get("form_id"),
            form_title: row.get("form_title"),
            submitted_at: row.get("submitted_at"),
            received_at: row.get("received_at"),
            raw_payload: row.get("raw_payload"),
        }))
    }

    /// Answers of one submission, in insertion order
    pub async fn answers_for(&self, submission_id: i64) -> Result<Vec<StoredAnswer>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT question_id, question_label, question_ref, answer_kind, value
            FROM answers
            WHERE submission_id = ?
            ORDER BY id
            "#,
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| StoredAnswer {
                question_id: row.get("question_id"),
                question_label: row.get("question_label"),
                question_ref: row.get("question_ref"),
                answer_kind: row.get("answer_kind"),
                value: row.get("value"),
            })
            .collect())
    }

    pub async fn count_submissions(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM submissions")
            .fetch_one(&self.pool)
            .await
    }

    pub async fn count_answers(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM answers")
            .fetch_one(&self.pool)
            .await
    }
}

fn existing(id: i64, token: &str) -> PersistedSubmission {
    PersistedSubmission {
        id,
        token: token.to_string(),
        created: false,
        answers_inserted: 0,
        answer_failure: None,
    }
}
