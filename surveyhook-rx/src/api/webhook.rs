//! Webhook delivery endpoint
//!
//! `POST /webhook` only; every other method gets 405 with the standard
//! error body. The payload ceiling is applied while reading, before the
//! pipeline sees a single byte.

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use surveyhook_common::signature::SIGNATURE_HEADER;
use tracing::debug;

use crate::error::HookError;
use crate::validator::Rejection;
use crate::AppState;

/// Acknowledgement for an accepted delivery
#[derive(Debug, Serialize)]
pub struct DeliveryAck {
    pub status: &'static str,
    /// Provider token of the stored submission
    pub submission_id: String,
    /// `true` when the token was already stored
    pub duplicate: bool,
}

/// POST /webhook
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<DeliveryAck>, HookError> {
    let limit = state.pipeline.validator().max_payload_bytes();

    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<usize>().ok());
    if let Some(size) = declared.filter(|size| *size > limit) {
        return Err(Rejection::PayloadTooLarge {
            size: Some(size),
            limit,
        }
        .into());
    }

    // One byte over the ceiling is enough for the validator to reject
    let bytes = to_bytes(body, limit.saturating_add(1))
        .await
        .map_err(|e| read_failure(e, limit))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .map(|v| v.to_str().unwrap_or_default());

    let receipt = state.pipeline.process(&bytes, signature).await?;

    Ok(Json(DeliveryAck {
        status: "ok",
        duplicate: receipt.is_duplicate(),
        submission_id: receipt.submission_token,
    }))
}

/// Any method other than POST on the webhook route
pub async fn method_not_allowed() -> HookError {
    HookError::MethodNotAllowed
}

fn read_failure(error: axum::Error, limit: usize) -> Rejection {
    let inner = error.into_inner();
    if inner.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
        return Rejection::PayloadTooLarge { size: None, limit };
    }
    debug!(error = %inner, "Failed to read delivery body");
    Rejection::InvalidJson(format!("request body could not be read: {}", inner))
}

/// Build webhook routes
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route(
        "/webhook",
        post(receive_webhook).fallback(method_not_allowed),
    )
}
