//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the durable store does not answer
    pub status: String,
    pub module: String,
    pub version: String,
    /// `enabled` or `disabled`
    pub mirror: String,
    /// `enforced`, or `open` when no signing secret is configured
    pub signing: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_ok = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(state.pipeline.store().pool())
        .await
        .is_ok();

    Json(HealthResponse {
        status: if store_ok { "ok" } else { "degraded" }.to_string(),
        module: "surveyhook-rx".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mirror: if state.pipeline.mirror_enabled() { "enabled" } else { "disabled" }.to_string(),
        signing: if state.pipeline.signing_enabled() { "enforced" } else { "open" }.to_string(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
