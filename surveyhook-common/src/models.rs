//! Submission and answer models shared by the receiver stages

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Variant tag of a provider answer
///
/// Tags follow the provider's `type` field. Anything outside the known set
/// is carried as [`AnswerKind::Other`] with the original tag so it can still
/// be stored and inspected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnswerKind {
    ShortText,
    Email,
    Url,
    Choice,
    Choices,
    Number,
    Boolean,
    Date,
    FileUrl,
    PhoneNumber,
    /// Unrecognized tag (`"other"` when the answer had no tag at all)
    Other(String),
}

impl AnswerKind {
    /// Every recognized kind, in declaration order
    pub const KNOWN: [AnswerKind; 10] = [
        AnswerKind::ShortText,
        AnswerKind::Email,
        AnswerKind::Url,
        AnswerKind::Choice,
        AnswerKind::Choices,
        AnswerKind::Number,
        AnswerKind::Boolean,
        AnswerKind::Date,
        AnswerKind::FileUrl,
        AnswerKind::PhoneNumber,
    ];

    /// Map a provider `type` tag to a kind
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("text") => AnswerKind::ShortText,
            Some("email") => AnswerKind::Email,
            Some("url") => AnswerKind::Url,
            Some("choice") => AnswerKind::Choice,
            Some("choices") => AnswerKind::Choices,
            Some("number") => AnswerKind::Number,
            Some("boolean") => AnswerKind::Boolean,
            Some("date") => AnswerKind::Date,
            Some("file_url") => AnswerKind::FileUrl,
            Some("phone_number") => AnswerKind::PhoneNumber,
            Some(other) if !other.trim().is_empty() => AnswerKind::Other(other.to_string()),
            _ => AnswerKind::Other("other".to_string()),
        }
    }

    /// Tag as stored in the `answers.answer_kind` column
    pub fn as_str(&self) -> &str {
        match self {
            AnswerKind::ShortText => "text",
            AnswerKind::Email => "email",
            AnswerKind::Url => "url",
            AnswerKind::Choice => "choice",
            AnswerKind::Choices => "choices",
            AnswerKind::Number => "number",
            AnswerKind::Boolean => "boolean",
            AnswerKind::Date => "date",
            AnswerKind::FileUrl => "file_url",
            AnswerKind::PhoneNumber => "phone_number",
            AnswerKind::Other(tag) => tag,
        }
    }

    /// Whether the kind is one of [`AnswerKind::KNOWN`]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, AnswerKind::Other(_))
    }
}

impl fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AnswerKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One question/response pair after extraction
///
/// Only answers with a non-blank value are ever constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedAnswer {
    /// Stable question identifier from the form schema
    pub question_id: String,
    /// Resolved human-readable prompt
    pub question_label: String,
    /// Schema reference string, when the provider sent one
    pub question_ref: Option<String>,
    pub kind: AnswerKind,
    pub value: String,
}

/// A submission ready for the durable store
#[derive(Debug, Clone)]
pub struct NewSubmission {
    /// Provider token - the idempotency key
    pub token: String,
    pub form_id: String,
    pub form_title: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    /// The complete decoded delivery, kept for audit and re-derivation
    pub raw_payload: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tags_round_trip_through_as_str() {
        for kind in AnswerKind::KNOWN {
            assert_eq!(AnswerKind::from_tag(Some(kind.as_str())), kind);
            assert!(kind.is_recognized());
        }
    }

    #[test]
    fn test_unknown_tag_is_preserved() {
        let kind = AnswerKind::from_tag(Some("payment"));
        assert_eq!(kind, AnswerKind::Other("payment".to_string()));
        assert_eq!(kind.as_str(), "payment");
        assert!(!kind.is_recognized());
    }

    #[test]
    fn test_missing_tag_is_other() {
        assert_eq!(AnswerKind::from_tag(None).as_str(), "other");
        assert_eq!(AnswerKind::from_tag(Some("  ")).as_str(), "other");
    }

    #[test]
    fn test_kind_serializes_as_tag() {
        let json = serde_json::to_string(&AnswerKind::PhoneNumber).unwrap();
        assert_eq!(json, "\"phone_number\"");
    }
}
