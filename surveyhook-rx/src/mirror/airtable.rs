//! Spreadsheet REST client
//!
//! Talks the Airtable-style records API:
//! - `GET  {api}/v0/{base}/{table}?filterByFormula=...&maxRecords=1`
//! - `POST {api}/v0/{base}/{table}` with `{"records":[{"fields":{..}}],"typecast":true}`

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use surveyhook_common::config::MirrorConfig;

use super::{MirrorClient, MirrorError, ProjectedRecord, SUBMISSION_ID_COLUMN};

const USER_AGENT: &str = concat!("surveyhook/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(default)]
    records: Vec<RecordRef>,
}

#[derive(Debug, Deserialize)]
struct RecordRef {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    records: [CreateFields<'a>; 1],
    typecast: bool,
}

#[derive(Debug, Serialize)]
struct CreateFields<'a> {
    fields: &'a ProjectedRecord,
}

/// Records API client for one base/table
pub struct AirtableClient {
    http_client: reqwest::Client,
    records_url: Url,
    /// `None` when no link base is configured
    link_base_url: Option<Url>,
    base_id: String,
    table: String,
    api_token: String,
}

impl std::fmt::Debug for AirtableClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirtableClient")
            .field("records_url", &self.records_url.as_str())
            .field("base_id", &self.base_id)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl AirtableClient {
    pub fn new(config: &MirrorConfig) -> Result<Self, MirrorError> {
        let base_id = required(config.base_id.as_deref(), "mirror.base_id")?;
        let api_token = required(config.api_token.as_deref(), "mirror.api_token")?;
        let table = required(Some(config.table.as_str()), "mirror.table")?;

        let mut records_url = Url::parse(config.api_url.trim())
            .map_err(|e| MirrorError::Config(format!("mirror.api_url: {}", e)))?;
        records_url
            .path_segments_mut()
            .map_err(|_| MirrorError::Config("mirror.api_url cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(["v0", base_id.as_str(), table.as_str()]);

        let link_base_url = match config.link_base_url.trim() {
            "" => None,
            base => Some(
                Url::parse(base)
                    .map_err(|e| MirrorError::Config(format!("mirror.link_base_url: {}", e)))?,
            ),
        };

        // Per-request ceiling; the writer also bounds the whole stage
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout().max(Duration::from_millis(1)))
            .build()
            .map_err(|e| MirrorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            records_url,
            link_base_url,
            base_id,
            table,
            api_token,
        })
    }

    pub fn records_url(&self) -> &Url {
        &self.records_url
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, MirrorError> {
        let status = response.status();

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(MirrorError::Auth(status.as_u16()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl MirrorClient for AirtableClient {
    async fn find_by_submission_id(
        &self,
        submission_id: &str,
    ) -> Result<Option<String>, MirrorError> {
        let formula = submission_filter_formula(SUBMISSION_ID_COLUMN, submission_id);

        tracing::debug!(submission_id, "Querying mirror for existing record");

        let response = self
            .http_client
            .get(self.records_url.clone())
            .bearer_auth(&self.api_token)
            .query(&[("filterByFormula", formula.as_str()), ("maxRecords", "1")])
            .send()
            .await
            .map_err(|e| MirrorError::Network(e.to_string()))?;

        let list: RecordList = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| MirrorError::Parse(e.to_string()))?;

        Ok(list.records.into_iter().next().map(|r| r.id))
    }

    async fn create_record(&self, record: &ProjectedRecord) -> Result<String, MirrorError> {
        let request = CreateRequest {
            records: [CreateFields { fields: record }],
            typecast: true,
        };

        let response = self
            .http_client
            .post(self.records_url.clone())
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| MirrorError::Network(e.to_string()))?;

        let created: RecordList = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| MirrorError::Parse(e.to_string()))?;

        created
            .records
            .into_iter()
            .next()
            .map(|r| r.id)
            .ok_or_else(|| MirrorError::Parse("create response contained no record".to_string()))
    }

    fn record_link(&self, record_id: &str) -> Option<String> {
        let mut link = self.link_base_url.clone()?;
        link.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend([self.base_id.as_str(), self.table.as_str(), record_id]);
        Some(link.into())
    }
}

/// `{Column}='value'` with the value escaped for a formula string literal
pub fn submission_filter_formula(column: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("{{{}}}='{}'", column, escaped)
}

fn required(value: Option<&str>, name: &str) -> Result<String, MirrorError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| MirrorError::Config(format!("{} is required", name)))
}
