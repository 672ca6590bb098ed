//! Answer extraction and question label resolution
//!
//! Converts the provider's tagged answers into plain text, independent of
//! where the text ends up. Extraction is total: unknown kinds render as a
//! compact JSON dump of the whole answer instead of failing.

use serde_json::Value;
use std::collections::HashMap;
use surveyhook_common::models::{AnswerKind, NormalizedAnswer};
use tracing::debug;

use crate::event::{FieldRef, FormDefinition, FormResponse, RawAnswer};

/// Label used when nothing better can be resolved
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Separator for multi-choice answers
pub const CHOICES_SEPARATOR: &str = ", ";

/// Render one answer as text
///
/// Returns `None` when a known kind carries no usable value (missing or
/// wrongly typed value field).
pub fn extract_value(answer: &RawAnswer) -> Option<String> {
    let body = &answer.body;
    match &answer.kind {
        AnswerKind::ShortText => string_field(body, "text"),
        AnswerKind::Email => string_field(body, "email"),
        AnswerKind::Url => string_field(body, "url"),
        AnswerKind::Date => string_field(body, "date"),
        AnswerKind::FileUrl => string_field(body, "file_url"),
        AnswerKind::PhoneNumber => string_field(body, "phone_number"),
        AnswerKind::Choice => {
            let choice = body.get("choice")?;
            string_field(choice, "label").or_else(|| string_field(choice, "other"))
        }
        AnswerKind::Choices => {
            let choices = body.get("choices")?;
            let mut parts: Vec<String> = choices
                .get("labels")
                .and_then(Value::as_array)
                .map(|labels| {
                    labels
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            if let Some(other) = string_field(choices, "other") {
                parts.push(other);
            }
            (!parts.is_empty()).then(|| parts.join(CHOICES_SEPARATOR))
        }
        AnswerKind::Number => match body.get("number")? {
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        },
        AnswerKind::Boolean => body
            .get("boolean")?
            .as_bool()
            .map(|b| if b { "Yes" } else { "No" }.to_string()),
        AnswerKind::Other(_) => Some(body.to_string()),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(str::to_string)
}

/// Per-event map from question id to the definition's label
#[derive(Debug, Default, Clone)]
pub struct LabelIndex {
    by_id: HashMap<String, String>,
    by_ref: HashMap<String, String>,
}

impl LabelIndex {
    /// Build from the delivery's embedded definition
    pub fn from_definition(definition: Option<&FormDefinition>) -> Self {
        let mut index = Self::default();
        let Some(definition) = definition else {
            return index;
        };

        for field in &definition.fields {
            let Some(title) = non_blank(field.title.as_deref()) else {
                continue;
            };
            if let Some(id) = non_blank(field.id.as_deref()) {
                index.by_id.insert(id.to_string(), title.to_string());
            }
            if let Some(reference) = non_blank(field.reference.as_deref()) {
                index.by_ref.insert(reference.to_string(), title.to_string());
            }
        }
        index
    }

    /// Resolve a label: definition title, then inline title, then the
    /// reference string, then [`UNKNOWN_LABEL`]
    pub fn resolve(&self, field: &FieldRef) -> String {
        non_blank(field.id.as_deref())
            .and_then(|id| self.by_id.get(id))
            .or_else(|| {
                non_blank(field.reference.as_deref()).and_then(|r| self.by_ref.get(r))
            })
            .map(String::as_str)
            .or_else(|| non_blank(field.title.as_deref()))
            .or_else(|| non_blank(field.reference.as_deref()))
            .unwrap_or(UNKNOWN_LABEL)
            .to_string()
    }
}

/// Stable question identifier: field id, then field ref, then position
pub fn question_id(field: &FieldRef, index: usize) -> String {
    non_blank(field.id.as_deref())
        .or_else(|| non_blank(field.reference.as_deref()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("answer_{}", index))
}

/// Extract every answer of a delivery, dropping those without a value
///
/// Values are trimmed; an answer whose value is empty after trimming never
/// leaves this function.
pub fn normalize_answers(response: &FormResponse) -> Vec<NormalizedAnswer> {
    let labels = LabelIndex::from_definition(response.definition.as_ref());

    response
        .answers()
        .iter()
        .enumerate()
        .filter_map(|(index, answer)| {
            let question_id = question_id(&answer.field, index);
            let value = extract_value(answer)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());

            let Some(value) = value else {
                debug!(
                    question_id = %question_id,
                    kind = %answer.kind,
                    "Dropping answer without a value"
                );
                return None;
            };

            Some(NormalizedAnswer {
                question_label: labels.resolve(&answer.field),
                question_ref: non_blank(answer.field.reference.as_deref()).map(str::to_string),
                question_id,
                kind: answer.kind.clone(),
                value,
            })
        })
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
