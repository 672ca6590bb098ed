//! Error types for surveyhook-rx
//!
//! Only failures that must reach the sender live here. Mirror trouble is a
//! soft outcome and never becomes a [`HookError`].

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use surveyhook_common::SignatureCheck;
use thiserror::Error;

use crate::db::PersistenceError;
use crate::validator::Rejection;

/// Seconds a sender should wait before redelivering after a store failure
pub const RETRY_AFTER_SECS: u32 = 30;

/// Delivery failure reported to the sender
#[derive(Debug, Error)]
pub enum HookError {
    /// Signature missing or wrong (401)
    #[error("{}", unauthorized_message(.0))]
    Unauthorized(SignatureCheck),

    /// Structurally unusable delivery (400 / 413)
    #[error(transparent)]
    Malformed(#[from] Rejection),

    /// Anything but POST on the webhook route (405)
    #[error("Method not allowed; deliveries must use POST")]
    MethodNotAllowed,

    /// Durable store unavailable (500, sender retries)
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

fn unauthorized_message(check: &SignatureCheck) -> &'static str {
    match check {
        SignatureCheck::Missing => "Delivery signature is missing",
        _ => "Delivery signature does not match the body",
    }
}

impl HookError {
    pub fn status(&self) -> StatusCode {
        match self {
            HookError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HookError::Malformed(Rejection::PayloadTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            HookError::Malformed(_) => StatusCode::BAD_REQUEST,
            HookError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HookError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            HookError::Unauthorized(SignatureCheck::Missing) => "MISSING_SIGNATURE",
            HookError::Unauthorized(_) => "INVALID_SIGNATURE",
            HookError::Malformed(rejection) => rejection.code(),
            HookError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            HookError::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }
}

impl IntoResponse for HookError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));

        match self {
            HookError::Persistence(_) => (
                status,
                [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
                body,
            )
                .into_response(),
            HookError::MethodNotAllowed => {
                (status, [(header::ALLOW, "POST")], body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_code_mapping() {
        let cases = [
            (
                HookError::Unauthorized(SignatureCheck::Missing),
                StatusCode::UNAUTHORIZED,
                "MISSING_SIGNATURE",
            ),
            (
                HookError::Unauthorized(SignatureCheck::Invalid),
                StatusCode::UNAUTHORIZED,
                "INVALID_SIGNATURE",
            ),
            (
                HookError::Malformed(Rejection::PayloadTooLarge {
                    size: None,
                    limit: 10,
                }),
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
            ),
            (
                HookError::Malformed(Rejection::MissingEnvelope),
                StatusCode::BAD_REQUEST,
                "MISSING_ENVELOPE",
            ),
            (
                HookError::MethodNotAllowed,
                StatusCode::METHOD_NOT_ALLOWED,
                "METHOD_NOT_ALLOWED",
            ),
            (
                HookError::Persistence(PersistenceError::Timeout(
                    std::time::Duration::from_secs(1),
                )),
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_FAILURE",
            ),
        ];

        for (error, status, code) in cases {
            assert_eq!(error.status(), status);
            assert_eq!(error.code(), code);
        }
    }

    #[test]
    fn test_persistence_failure_sets_retry_after() {
        let response = HookError::Persistence(PersistenceError::Timeout(
            std::time::Duration::from_secs(1),
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = response.headers().get(header::RETRY_AFTER).unwrap();
        assert_eq!(retry_after.to_str().unwrap(), RETRY_AFTER_SECS.to_string());
    }
}
