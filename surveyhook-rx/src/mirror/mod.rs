//! Best-effort mirror of submissions into the review spreadsheet
//!
//! Nothing in this module can fail a delivery. Client errors stay inside
//! as [`MirrorError`] and leave only as text in [`MirrorOutcome::Failed`].

pub mod airtable;
pub mod writer;

use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

pub use airtable::AirtableClient;
pub use writer::MirrorWriter;

/// Metadata column holding the idempotency key
pub const SUBMISSION_ID_COLUMN: &str = "Submission ID";
pub const SUBMITTED_AT_COLUMN: &str = "Submitted At";
pub const FORM_TITLE_COLUMN: &str = "Form Title";
pub const STATUS_COLUMN: &str = "Status";

/// Review status given to every new record
pub const INITIAL_STATUS: &str = "New";

/// Form title used when the delivery carries none
pub const UNTITLED_FORM: &str = "Untitled Form";

/// Per-cell character limit of the spreadsheet
pub const MAX_FIELD_CHARS: usize = 100_000;

/// Mirror client errors
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Rejected credentials (HTTP {0})")]
    Auth(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Mirror misconfigured: {0}")]
    Config(String),

    #[error("Mirror did not respond within {0:?}")]
    Timeout(std::time::Duration),
}

/// Secondary system operations needed for an idempotent insert
#[async_trait]
pub trait MirrorClient: Send + Sync {
    /// Record id of an existing row with this submission id, if any
    async fn find_by_submission_id(&self, submission_id: &str)
        -> Result<Option<String>, MirrorError>;

    /// Insert one record, returning its id
    async fn create_record(&self, record: &ProjectedRecord) -> Result<String, MirrorError>;

    /// Human-facing link to a record
    fn record_link(&self, _record_id: &str) -> Option<String> {
        None
    }
}

/// Column → value pairs in insertion order
///
/// Serializes as a JSON object. A column is only ever set once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedRecord {
    fields: Vec<(String, String)>,
}

impl ProjectedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` unless it already holds a value; returns whether it was set
    pub fn set_if_absent(&mut self, column: &str, value: impl Into<String>) -> bool {
        if self.get(column).is_some() {
            return false;
        }
        self.fields.push((column.to_string(), value.into()));
        true
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }
}

impl Serialize for ProjectedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Soft result of the mirror stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    Created {
        record_id: String,
        link: Option<String>,
    },
    /// A record for this submission already existed; nothing written
    AlreadyMirrored { record_id: String },
    /// No mirror configured
    Disabled,
    Failed { reason: String },
}

impl MirrorOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, MirrorOutcome::Failed { .. })
    }

    pub fn record_id(&self) -> Option<&str> {
        match self {
            MirrorOutcome::Created { record_id, .. }
            | MirrorOutcome::AlreadyMirrored { record_id } => Some(record_id),
            MirrorOutcome::Disabled | MirrorOutcome::Failed { .. } => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorOutcome::Created { .. } => "created",
            MirrorOutcome::AlreadyMirrored { .. } => "already_mirrored",
            MirrorOutcome::Disabled => "disabled",
            MirrorOutcome::Failed { .. } => "failed",
        }
    }
}
