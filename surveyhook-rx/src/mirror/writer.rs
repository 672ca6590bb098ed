//! Projected record construction and the bounded mirror stage

use std::sync::Arc;
use std::time::Duration;
use surveyhook_common::models::{NewSubmission, NormalizedAnswer};
use tracing::{debug, info, warn};

use super::{
    MirrorClient, MirrorError, MirrorOutcome, ProjectedRecord, FORM_TITLE_COLUMN, INITIAL_STATUS,
    MAX_FIELD_CHARS, STATUS_COLUMN, SUBMISSION_ID_COLUMN, SUBMITTED_AT_COLUMN, UNTITLED_FORM,
};
use crate::projection::{Classifier, MatchOutcome, Question};

/// Placeholder answers that carry no information
const NOT_APPLICABLE: [&str; 2] = ["n/a", "not applicable"];

/// Writes one projected record per submission, at most once
#[derive(Clone)]
pub struct MirrorWriter {
    client: Option<Arc<dyn MirrorClient>>,
    timeout: Duration,
}

impl std::fmt::Debug for MirrorWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorWriter")
            .field("enabled", &self.is_enabled())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MirrorWriter {
    pub fn new(client: Arc<dyn MirrorClient>, timeout: Duration) -> Self {
        Self {
            client: Some(client),
            timeout,
        }
    }

    /// Writer that reports [`MirrorOutcome::Disabled`] for everything
    pub fn disabled() -> Self {
        Self {
            client: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Mirror a persisted submission
    ///
    /// Never fails: errors and the deadline both come back as
    /// [`MirrorOutcome::Failed`].
    pub async fn mirror(
        &self,
        submission: &NewSubmission,
        answers: &[NormalizedAnswer],
    ) -> MirrorOutcome {
        let Some(client) = &self.client else {
            return MirrorOutcome::Disabled;
        };

        let record = build_record(submission, answers);
        let token = submission.token.as_str();

        let result = tokio::time::timeout(self.timeout, upsert(client.as_ref(), token, &record))
            .await
            .unwrap_or(Err(MirrorError::Timeout(self.timeout)));

        match result {
            Ok(outcome) => {
                info!(
                    token,
                    outcome = outcome.as_str(),
                    record_id = outcome.record_id().unwrap_or_default(),
                    "Mirror stage finished"
                );
                outcome
            }
            Err(e) => {
                warn!(token, error = %e, "Mirror stage failed; submission remains stored");
                MirrorOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Query-then-insert keyed on the submission id column
async fn upsert(
    client: &dyn MirrorClient,
    token: &str,
    record: &ProjectedRecord,
) -> Result<MirrorOutcome, MirrorError> {
    if let Some(record_id) = client.find_by_submission_id(token).await? {
        return Ok(MirrorOutcome::AlreadyMirrored { record_id });
    }

    let record_id = client.create_record(record).await?;
    let link = client.record_link(&record_id);
    Ok(MirrorOutcome::Created { record_id, link })
}

/// Metadata columns first, then each answer the classifier can place
pub fn build_record(submission: &NewSubmission, answers: &[NormalizedAnswer]) -> ProjectedRecord {
    let mut record = ProjectedRecord::new();
    record.set_if_absent(SUBMISSION_ID_COLUMN, submission.token.as_str());
    record.set_if_absent(SUBMITTED_AT_COLUMN, submission.submitted_at.to_rfc3339());
    record.set_if_absent(
        FORM_TITLE_COLUMN,
        submission.form_title.as_deref().unwrap_or(UNTITLED_FORM),
    );
    record.set_if_absent(STATUS_COLUMN, INITIAL_STATUS);

    let mut classifier = Classifier::new();

    for answer in answers {
        let value = answer.value.trim();
        if value.is_empty() || is_not_applicable(value) {
            continue;
        }

        let question = Question {
            label: &answer.question_label,
            reference: answer.question_ref.as_deref(),
            kind: &answer.kind,
        };
        let classification = classifier.classify(&question, value);

        match classification.column {
            Some(column) => {
                if !record.set_if_absent(column, truncate_chars(value, MAX_FIELD_CHARS)) {
                    debug!(
                        question_id = %answer.question_id,
                        column,
                        "Column already filled by an earlier answer"
                    );
                }
            }
            None => {
                let reason = match classification.outcome {
                    MatchOutcome::Overflow => "catch-all slots exhausted",
                    _ => "no matching column",
                };
                debug!(
                    question_id = %answer.question_id,
                    label = %answer.question_label,
                    reason,
                    "Answer not projected"
                );
            }
        }
    }

    record
}

/// `"N/A"` and friends, case-insensitive
pub fn is_not_applicable(value: &str) -> bool {
    let value = value.trim();
    NOT_APPLICABLE.iter().any(|na| value.eq_ignore_ascii_case(na))
}

/// At most `max_chars` characters, cut on a char boundary
pub fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &value[..byte_index],
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Mutex;
    use surveyhook_common::models::AnswerKind;

    fn submission() -> NewSubmission {
        NewSubmission {
            token: "abc123".to_string(),
            form_id: "F1".to_string(),
            form_title: None,
            submitted_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            received_at: Utc::now(),
            raw_payload: json!({}),
        }
    }

    fn answer(label: &str, kind: AnswerKind, value: &str) -> NormalizedAnswer {
        NormalizedAnswer {
            question_id: label.to_string(),
            question_label: label.to_string(),
            question_ref: None,
            kind,
            value: value.to_string(),
        }
    }

    #[derive(Default)]
    struct RecordingClient {
        existing: Option<String>,
        created: Mutex<Vec<ProjectedRecord>>,
    }

    #[async_trait]
    impl MirrorClient for RecordingClient {
        async fn find_by_submission_id(&self, _: &str) -> Result<Option<String>, MirrorError> {
            Ok(self.existing.clone())
        }

        async fn create_record(&self, record: &ProjectedRecord) -> Result<String, MirrorError> {
            let mut created = self.created.lock().unwrap();
            created.push(record.clone());
            Ok(format!("rec{}", created.len()))
        }

        fn record_link(&self, record_id: &str) -> Option<String> {
            Some(format!("https://sheet.test/{}", record_id))
        }
    }

    #[test]
    fn test_metadata_columns() {
        let record = build_record(&submission(), &[]);
        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(
            columns,
            vec!["Submission ID", "Submitted At", "Form Title", "Status"]
        );
        assert_eq!(record.get("Submission ID"), Some("abc123"));
        assert_eq!(record.get("Submitted At"), Some("2024-05-01T12:00:00+00:00"));
        assert_eq!(record.get("Form Title"), Some("Untitled Form"));
        assert_eq!(record.get("Status"), Some("New"));
    }

    #[test]
    fn test_email_answer_is_projected() {
        let answers = [answer("Your Email", AnswerKind::Email, "a@b.com")];
        let record = build_record(&submission(), &answers);
        assert_eq!(record.get("Email Address"), Some("a@b.com"));
    }

    #[test]
    fn test_not_applicable_values_skip_before_classification() {
        let answers = [
            answer("Anything else?", AnswerKind::ShortText, "N/A"),
            answer("Additional comments", AnswerKind::ShortText, "Call after 5pm"),
        ];
        let record = build_record(&submission(), &answers);
        // The placeholder does not use up the first slot
        assert_eq!(record.get("Additional Notes 1"), Some("Call after 5pm"));
        assert_eq!(record.get("Additional Notes 2"), None);
    }

    #[test]
    fn test_first_answer_per_column_wins() {
        let answers = [
            answer("Your Email", AnswerKind::Email, "first@x.test"),
            answer("Work email", AnswerKind::Email, "second@x.test"),
        ];
        let record = build_record(&submission(), &answers);
        assert_eq!(record.get("Email Address"), Some("first@x.test"));
    }

    #[test]
    fn test_long_value_is_truncated() {
        let long = "é".repeat(MAX_FIELD_CHARS + 10);
        let answers = [answer("Additional comments", AnswerKind::ShortText, &long)];
        let record = build_record(&submission(), &answers);
        let stored = record.get("Additional Notes 1").unwrap();
        assert_eq!(stored.chars().count(), MAX_FIELD_CHARS);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("añb", 2), "añ");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_is_not_applicable() {
        assert!(is_not_applicable("N/A"));
        assert!(is_not_applicable(" n/a "));
        assert!(is_not_applicable("Not Applicable"));
        assert!(!is_not_applicable("NA please"));
    }

    #[tokio::test]
    async fn test_disabled_writer() {
        let outcome = MirrorWriter::disabled().mirror(&submission(), &[]).await;
        assert_eq!(outcome, MirrorOutcome::Disabled);
    }

    #[tokio::test]
    async fn test_creates_when_absent() {
        let client = Arc::new(RecordingClient::default());
        let writer = MirrorWriter::new(client.clone(), Duration::from_secs(1));

        let outcome = writer.mirror(&submission(), &[]).await;
        assert_eq!(
            outcome,
            MirrorOutcome::Created {
                record_id: "rec1".to_string(),
                link: Some("https://sheet.test/rec1".to_string()),
            }
        );
        assert_eq!(client.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_existing_record_is_not_duplicated() {
        let client = Arc::new(RecordingClient {
            existing: Some("recOld".to_string()),
            ..Default::default()
        });
        let writer = MirrorWriter::new(client.clone(), Duration::from_secs(1));

        let outcome = writer.mirror(&submission(), &[]).await;
        assert_eq!(
            outcome,
            MirrorOutcome::AlreadyMirrored {
                record_id: "recOld".to_string()
            }
        );
        assert!(client.created.lock().unwrap().is_empty());
    }
}
