//! Inbound webhook envelope
//!
//! Mirrors the provider's delivery shape closely enough to pull out the
//! identifiers, the embedded form definition and the answer list. Unknown
//! fields are ignored here; the untouched body travels alongside as
//! [`serde_json::Value`] for the durable store.

use serde::Deserialize;
use serde_json::Value;
use surveyhook_common::models::AnswerKind;

/// Top-level delivery
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    pub form_response: FormResponse,
}

/// The envelope: one submission of one form
#[derive(Debug, Clone, Deserialize)]
pub struct FormResponse {
    /// Submission token (idempotency key)
    pub token: String,
    pub form_id: String,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub landed_at: Option<String>,
    #[serde(default)]
    pub definition: Option<FormDefinition>,
    #[serde(default)]
    answers: Option<Vec<RawAnswer>>,
}

impl FormResponse {
    /// Answers in delivery order (`null` and absent both read as empty)
    pub fn answers(&self) -> &[RawAnswer] {
        self.answers.as_deref().unwrap_or_default()
    }

    /// Form title from the embedded definition, if any
    pub fn form_title(&self) -> Option<&str> {
        self.definition
            .as_ref()
            .and_then(|d| d.title.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Embedded form schema sent with every delivery
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormDefinition {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldRef>,
}

/// A question reference, as found both in the definition and on answers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
}

/// One provider answer
///
/// The full JSON object is kept so kinds outside the known set can still be
/// rendered losslessly.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "Value")]
pub struct RawAnswer {
    pub kind: AnswerKind,
    pub field: FieldRef,
    pub body: Value,
}

impl From<Value> for RawAnswer {
    fn from(body: Value) -> Self {
        let kind = AnswerKind::from_tag(body.get("type").and_then(Value::as_str));
        let field = body
            .get("field")
            .and_then(|f| FieldRef::deserialize(f).ok())
            .unwrap_or_default();
        Self { kind, field, body }
    }
}
