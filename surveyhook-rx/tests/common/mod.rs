//! Shared fixtures for surveyhook-rx integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use surveyhook_common::SignatureVerifier;
use surveyhook_rx::db::{init_schema, SubmissionStore};
use surveyhook_rx::mirror::{
    MirrorClient, MirrorError, MirrorWriter, ProjectedRecord, SUBMISSION_ID_COLUMN,
};
use surveyhook_rx::validator::EventValidator;
use surveyhook_rx::Pipeline;

pub const SECRET: &str = "test-signing-secret";
pub const MAX_PAYLOAD: usize = 16 * 1024;

/// Single-connection in-memory database with the schema applied
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    init_schema(&pool).await.expect("schema");
    pool
}

pub fn pipeline_with(
    pool: SqlitePool,
    secret: Option<&str>,
    mirror: MirrorWriter,
) -> Pipeline {
    Pipeline::new(
        SignatureVerifier::new(secret.map(str::to_string)),
        EventValidator::new(MAX_PAYLOAD),
        SubmissionStore::new(pool),
        mirror,
        Duration::from_secs(5),
    )
}

pub fn sign(body: &[u8]) -> String {
    SignatureVerifier::new(Some(SECRET.to_string()))
        .sign(body)
        .expect("signing enabled")
}

/// Delivery with one email answer, as in the provider's documentation
pub fn email_delivery(token: &str) -> Value {
    json!({
        "event_id": format!("evt-{}", token),
        "event_type": "form_response",
        "form_response": {
            "token": token,
            "form_id": "F1",
            "submitted_at": "2024-05-01T12:00:00Z",
            "definition": {
                "id": "F1",
                "title": "Investor Survey",
                "fields": [{"id": "q1", "title": "Your Email", "type": "email"}]
            },
            "answers": [
                {"type": "email", "email": "a@b.com", "field": {"id": "q1", "type": "email"}}
            ]
        }
    })
}

pub fn to_body(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).expect("serializable")
}

/// In-memory stand-in for the spreadsheet, keyed by submission id
#[derive(Default)]
pub struct RecordingClient {
    records: Mutex<HashMap<String, (String, ProjectedRecord)>>,
    pub lookups: AtomicUsize,
    pub creates: AtomicUsize,
}

impl RecordingClient {
    pub fn record_for(&self, submission_id: &str) -> Option<ProjectedRecord> {
        self.records
            .lock()
            .unwrap()
            .get(submission_id)
            .map(|(_, record)| record.clone())
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl MirrorClient for RecordingClient {
    async fn find_by_submission_id(
        &self,
        submission_id: &str,
    ) -> Result<Option<String>, MirrorError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(submission_id)
            .map(|(id, _)| id.clone()))
    }

    async fn create_record(&self, record: &ProjectedRecord) -> Result<String, MirrorError> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        let submission_id = record
            .get(SUBMISSION_ID_COLUMN)
            .ok_or_else(|| MirrorError::Parse("record without submission id".into()))?
            .to_string();
        let record_id = format!("rec{}", n);
        self.records
            .lock()
            .unwrap()
            .insert(submission_id, (record_id.clone(), record.clone()));
        Ok(record_id)
    }
}

/// Mirror whose every call fails like an unreachable host
pub struct UnreachableClient;

#[async_trait]
impl MirrorClient for UnreachableClient {
    async fn find_by_submission_id(&self, _: &str) -> Result<Option<String>, MirrorError> {
        Err(MirrorError::Network("connection refused".into()))
    }

    async fn create_record(&self, _: &ProjectedRecord) -> Result<String, MirrorError> {
        Err(MirrorError::Network("connection refused".into()))
    }
}

/// Mirror that never answers in time
pub struct StalledClient(pub Duration);

#[async_trait]
impl MirrorClient for StalledClient {
    async fn find_by_submission_id(&self, _: &str) -> Result<Option<String>, MirrorError> {
        tokio::time::sleep(self.0).await;
        Ok(None)
    }

    async fn create_record(&self, _: &ProjectedRecord) -> Result<String, MirrorError> {
        tokio::time::sleep(self.0).await;
        Ok("late".into())
    }
}

pub fn writer(client: Arc<dyn MirrorClient>) -> MirrorWriter {
    MirrorWriter::new(client, Duration::from_secs(2))
}
