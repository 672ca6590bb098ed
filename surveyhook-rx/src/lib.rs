//! surveyhook-rx library - form submission webhook receiver
//!
//! Verifies, validates and durably stores each delivery exactly once, then
//! mirrors a projection of it into the review spreadsheet on a best-effort
//! basis.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod event;
pub mod extractor;
pub mod mirror;
pub mod pipeline;
pub mod projection;
pub mod validator;

pub use error::HookError;
pub use pipeline::{Pipeline, PipelineStage, Receipt};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::webhook_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
