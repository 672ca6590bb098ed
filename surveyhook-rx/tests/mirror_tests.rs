//! AirtableClient tests against a local stand-in for the records API

mod common;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use surveyhook_common::config::MirrorConfig;
use surveyhook_rx::mirror::airtable::submission_filter_formula;
use surveyhook_rx::mirror::{
    AirtableClient, MirrorClient, MirrorError, MirrorOutcome, MirrorWriter, ProjectedRecord,
    SUBMISSION_ID_COLUMN,
};

const TOKEN: &str = "pat-test-token";

#[derive(Default)]
struct FakeBase {
    /// (record id, fields)
    records: Vec<(String, Value)>,
    /// Status forced on every create, when set
    fail_creates_with: Option<u16>,
    seen_tables: Vec<String>,
}

type Shared = Arc<Mutex<FakeBase>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

async fn list_records(
    State(base): State<Shared>,
    Path((_base_id, table)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "AUTHENTICATION_REQUIRED"})));
    }
    let mut base = base.lock().unwrap();
    base.seen_tables.push(table);

    let formula = query.get("filterByFormula").cloned().unwrap_or_default();
    assert_eq!(query.get("maxRecords").map(String::as_str), Some("1"));

    let found: Vec<Value> = base
        .records
        .iter()
        .filter(|(_, fields)| {
            let id = fields[SUBMISSION_ID_COLUMN].as_str().unwrap_or_default();
            submission_filter_formula(SUBMISSION_ID_COLUMN, id) == formula
        })
        .take(1)
        .map(|(id, fields)| json!({"id": id, "fields": fields}))
        .collect();

    (StatusCode::OK, Json(json!({"records": found})))
}

async fn create_records(
    State(base): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "AUTHENTICATION_REQUIRED"})));
    }
    let mut base = base.lock().unwrap();
    if let Some(status) = base.fail_creates_with {
        return (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({"error": {"type": "UNKNOWN_FIELD_NAME"}})),
        );
    }

    assert_eq!(request["typecast"], true);
    let fields = request["records"][0]["fields"].clone();
    let id = format!("rec{:03}", base.records.len() + 1);
    base.records.push((id.clone(), fields.clone()));

    (StatusCode::OK, Json(json!({"records": [{"id": id, "fields": fields}]})))
}

async fn spawn_fake(base: Shared) -> SocketAddr {
    let app = Router::new()
        .route("/v0/:base/:table", get(list_records).post(create_records))
        .with_state(base);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config(addr: SocketAddr, token: &str) -> MirrorConfig {
    MirrorConfig {
        api_url: format!("http://{}", addr),
        link_base_url: "https://sheet.test".to_string(),
        base_id: Some("appBase".to_string()),
        table: "Survey Responses".to_string(),
        api_token: Some(token.to_string()),
        timeout_ms: 2_000,
    }
}

fn record(submission_id: &str) -> ProjectedRecord {
    let mut record = ProjectedRecord::new();
    record.set_if_absent(SUBMISSION_ID_COLUMN, submission_id);
    record.set_if_absent("Email Address", "a@b.com");
    record
}

#[tokio::test]
async fn test_create_then_find() {
    let base = Shared::default();
    let addr = spawn_fake(base.clone()).await;
    let client = AirtableClient::new(&config(addr, TOKEN)).unwrap();

    assert_eq!(client.find_by_submission_id("abc123").await.unwrap(), None);

    let id = client.create_record(&record("abc123")).await.unwrap();
    assert_eq!(id, "rec001");
    assert_eq!(
        client.find_by_submission_id("abc123").await.unwrap().as_deref(),
        Some("rec001")
    );

    let base = base.lock().unwrap();
    assert_eq!(base.records[0].1["Email Address"], "a@b.com");
    assert!(base.seen_tables.iter().all(|t| t == "Survey Responses"));
}

#[tokio::test]
async fn test_quoted_submission_id_round_trips() {
    let base = Shared::default();
    let addr = spawn_fake(base.clone()).await;
    let client = AirtableClient::new(&config(addr, TOKEN)).unwrap();

    client.create_record(&record("o'brien")).await.unwrap();
    client.create_record(&record("obrien")).await.unwrap();

    assert_eq!(
        client.find_by_submission_id("o'brien").await.unwrap().as_deref(),
        Some("rec001")
    );
}

#[tokio::test]
async fn test_bad_credentials_are_auth_error() {
    let addr = spawn_fake(Shared::default()).await;
    let client = AirtableClient::new(&config(addr, "wrong")).unwrap();

    let err = client.find_by_submission_id("abc123").await.unwrap_err();
    assert!(matches!(err, MirrorError::Auth(401)));
}

#[tokio::test]
async fn test_schema_rejection_is_api_error() {
    let base = Shared::default();
    base.lock().unwrap().fail_creates_with = Some(422);
    let addr = spawn_fake(base).await;
    let client = AirtableClient::new(&config(addr, TOKEN)).unwrap();

    match client.create_record(&record("abc123")).await.unwrap_err() {
        MirrorError::Api { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("UNKNOWN_FIELD_NAME"));
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_writer_mirrors_once() {
    let base = Shared::default();
    let addr = spawn_fake(base.clone()).await;
    let client = Arc::new(AirtableClient::new(&config(addr, TOKEN)).unwrap());
    let writer = MirrorWriter::new(client, Duration::from_secs(2));

    let pipeline = common::pipeline_with(common::memory_pool().await, None, writer);
    let body = common::to_body(&common::email_delivery("abc123"));

    let first = pipeline.process(&body, None).await.unwrap();
    assert_eq!(
        first.mirror,
        MirrorOutcome::Created {
            record_id: "rec001".to_string(),
            link: Some("https://sheet.test/appBase/Survey%20Responses/rec001".to_string()),
        }
    );

    let second = pipeline.process(&body, None).await.unwrap();
    assert_eq!(
        second.mirror,
        MirrorOutcome::AlreadyMirrored {
            record_id: "rec001".to_string()
        }
    );
    assert_eq!(base.lock().unwrap().records.len(), 1);
}

#[tokio::test]
async fn test_unreachable_api_is_soft_failure() {
    // Bind then drop to get a port nothing listens on
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = Arc::new(AirtableClient::new(&config(addr, TOKEN)).unwrap());
    let writer = MirrorWriter::new(client, Duration::from_secs(2));

    let pipeline = common::pipeline_with(common::memory_pool().await, None, writer);
    let body = common::to_body(&common::email_delivery("abc123"));

    let receipt = pipeline.process(&body, None).await.unwrap();
    assert!(receipt.mirror.is_failed());
    assert!(receipt.created);
}
