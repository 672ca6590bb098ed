//! Structural validation of inbound deliveries
//!
//! Runs before any side effect. Checks, in order:
//! 1. Body size against the configured ceiling
//! 2. Body is JSON
//! 3. Top-level `form_response` envelope is present
//! 4. Envelope carries a non-blank `token` and `form_id`
//!
//! Only then is the envelope decoded into typed form.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::event::WebhookEvent;

/// Envelope key wrapping one submission
pub const ENVELOPE_KEY: &str = "form_response";

/// Why a delivery was rejected before processing
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("Payload exceeds the {limit} byte ceiling")]
    PayloadTooLarge {
        /// Actual size, when known before reading the whole body
        size: Option<usize>,
        limit: usize,
    },

    #[error("Body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Body has no `form_response` envelope")]
    MissingEnvelope,

    #[error("Envelope is missing required field `{0}`")]
    MissingIdentifier(&'static str),

    #[error("Envelope could not be decoded: {0}")]
    InvalidEnvelope(String),
}

impl Rejection {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Rejection::InvalidJson(_) => "INVALID_JSON",
            Rejection::MissingEnvelope => "MISSING_ENVELOPE",
            Rejection::MissingIdentifier(_) => "MISSING_IDENTIFIER",
            Rejection::InvalidEnvelope(_) => "INVALID_ENVELOPE",
        }
    }
}

/// A delivery that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedEvent {
    /// The decoded body, unmodified
    pub raw: Value,
    pub event: WebhookEvent,
}

impl ValidatedEvent {
    pub fn token(&self) -> &str {
        &self.event.form_response.token
    }
}

/// Validates deliveries against a payload ceiling
#[derive(Debug, Clone, Copy)]
pub struct EventValidator {
    max_payload_bytes: usize,
}

impl EventValidator {
    pub fn new(max_payload_bytes: usize) -> Self {
        Self { max_payload_bytes }
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Validate one delivery body
    pub fn validate(&self, body: &[u8]) -> Result<ValidatedEvent, Rejection> {
        if body.len() > self.max_payload_bytes {
            return Err(Rejection::PayloadTooLarge {
                size: Some(body.len()),
                limit: self.max_payload_bytes,
            });
        }

        let raw: Value =
            serde_json::from_slice(body).map_err(|e| Rejection::InvalidJson(e.to_string()))?;

        let envelope = raw
            .get(ENVELOPE_KEY)
            .filter(|v| v.is_object())
            .ok_or(Rejection::MissingEnvelope)?;

        for field in ["token", "form_id"] {
            let present = envelope
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty());
            if !present {
                return Err(Rejection::MissingIdentifier(field));
            }
        }

        let event = WebhookEvent::deserialize(&raw)
            .map_err(|e| Rejection::InvalidEnvelope(e.to_string()))?;

        Ok(ValidatedEvent { raw, event })
    }
}
