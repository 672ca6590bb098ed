//! Delivery orchestrator
//!
//! Drives one delivery through
//! `Received → Verified → Validated → Persisted → Mirrored|MirrorFailed → Done`.
//!
//! Everything up to `Persisted` is mandatory and returns [`HookError`] on
//! failure. Past `Persisted` the result is always `Ok`; the mirror stage
//! only ever contributes a [`MirrorOutcome`] to the [`Receipt`].

use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use surveyhook_common::config::HookConfig;
use surveyhook_common::models::NewSubmission;
use surveyhook_common::{time, SignatureCheck, SignatureVerifier};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::db::{PersistenceError, SubmissionStore};
use crate::error::HookError;
use crate::extractor::normalize_answers;
use crate::mirror::{MirrorClient, MirrorOutcome, MirrorWriter};
use crate::validator::{EventValidator, ValidatedEvent};

/// Pipeline position of one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Verified,
    Validated,
    Persisted,
    Mirrored,
    MirrorFailed,
    Done,
}

/// Successful outcome of one delivery
#[derive(Debug, Clone)]
pub struct Receipt {
    pub submission_token: String,
    /// Durable store identity
    pub submission_id: i64,
    /// `false` for a redelivery of a stored token
    pub created: bool,
    pub answers_stored: usize,
    /// Why the answer batch was not stored, if it was not
    pub answer_failure: Option<String>,
    pub mirror: MirrorOutcome,
    /// Every stage visited, in order
    pub stages: Vec<PipelineStage>,
}

impl Receipt {
    pub fn is_duplicate(&self) -> bool {
        !self.created
    }

    pub fn final_stage(&self) -> PipelineStage {
        self.stages.last().copied().unwrap_or(PipelineStage::Received)
    }
}

/// Verifier, validator, store and mirror for one receiver
#[derive(Debug, Clone)]
pub struct Pipeline {
    verifier: SignatureVerifier,
    validator: EventValidator,
    store: SubmissionStore,
    mirror: MirrorWriter,
    store_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        verifier: SignatureVerifier,
        validator: EventValidator,
        store: SubmissionStore,
        mirror: MirrorWriter,
        store_timeout: Duration,
    ) -> Self {
        Self {
            verifier,
            validator,
            store,
            mirror,
            store_timeout,
        }
    }

    /// Wire a pipeline from configuration and injected handles
    pub fn from_config(
        config: &HookConfig,
        pool: SqlitePool,
        mirror_client: Option<Arc<dyn MirrorClient>>,
    ) -> Self {
        let mirror = match mirror_client {
            Some(client) => MirrorWriter::new(client, config.mirror.timeout()),
            None => MirrorWriter::disabled(),
        };

        Self::new(
            SignatureVerifier::new(config.signing_secret.clone()),
            EventValidator::new(config.max_payload_bytes),
            SubmissionStore::new(pool),
            mirror,
            config.store_timeout(),
        )
    }

    pub fn store(&self) -> &SubmissionStore {
        &self.store
    }

    pub fn validator(&self) -> &EventValidator {
        &self.validator
    }

    pub fn signing_enabled(&self) -> bool {
        self.verifier.is_enabled()
    }

    pub fn mirror_enabled(&self) -> bool {
        self.mirror.is_enabled()
    }

    /// Process one delivery body with its presented signature
    pub async fn process(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<Receipt, HookError> {
        let invocation_id = Uuid::new_v4();
        let span = info_span!(
            "delivery",
            %invocation_id,
            bytes = body.len(),
            token = tracing::field::Empty
        );
        self.run(body, signature).instrument(span).await
    }

    async fn run(&self, body: &[u8], signature: Option<&str>) -> Result<Receipt, HookError> {
        let received_at = time::now();
        let mut stages = vec![PipelineStage::Received];

        let check = self.verifier.verify(body, signature);
        if !check.is_accepted() {
            warn!(?check, "Rejecting delivery: signature check failed");
            return Err(HookError::Unauthorized(check));
        }
        if check == SignatureCheck::Disabled {
            debug!("Signature verification disabled (open mode)");
        }
        advance(&mut stages, PipelineStage::Verified);

        let ValidatedEvent { raw, event } = self.validator.validate(body).map_err(|rejection| {
            warn!(code = rejection.code(), error = %rejection, "Rejecting malformed delivery");
            rejection
        })?;
        let response = &event.form_response;
        tracing::Span::current().record("token", response.token.as_str());
        advance(&mut stages, PipelineStage::Validated);

        let answers = normalize_answers(response);
        let submission = NewSubmission {
            token: response.token.trim().to_string(),
            form_id: response.form_id.trim().to_string(),
            form_title: response.form_title().map(str::to_string),
            submitted_at: time::parse_or(response.submitted_at.as_deref(), received_at),
            received_at,
            raw_payload: raw,
        };

        // The deadline covers lookup and insert only; past that the row is
        // committed and nothing may turn the delivery into a failure
        let mut persisted = tokio::time::timeout(
            self.store_timeout,
            self.store.persist_submission(&submission),
        )
        .await
        .unwrap_or(Err(PersistenceError::Timeout(self.store_timeout)))
        .map_err(|e| {
            error!(error = %e, "Durable store failed; sender must redeliver");
            e
        })?;

        if persisted.created {
            let result = tokio::time::timeout(
                self.store_timeout,
                self.store.insert_answers(persisted.id, &answers),
            )
            .await
            .map_err(|_| format!("Answer insert did not finish within {:?}", self.store_timeout))
            .and_then(|inserted| inserted.map_err(|e| e.to_string()));
            persisted.record_answers(result);
        }
        advance(&mut stages, PipelineStage::Persisted);

        let mirror = self.mirror.mirror(&submission, &answers).await;
        advance(
            &mut stages,
            if mirror.is_failed() {
                PipelineStage::MirrorFailed
            } else {
                PipelineStage::Mirrored
            },
        );
        advance(&mut stages, PipelineStage::Done);

        info!(
            submission_id = persisted.id,
            created = persisted.created,
            answers = persisted.answers_inserted,
            mirror = mirror.as_str(),
            "Delivery processed"
        );

        Ok(Receipt {
            submission_token: persisted.token,
            submission_id: persisted.id,
            created: persisted.created,
            answers_stored: persisted.answers_inserted,
            answer_failure: persisted.answer_failure,
            mirror,
            stages,
        })
    }
}

fn advance(stages: &mut Vec<PipelineStage>, next: PipelineStage) {
    debug!(from = ?stages.last(), to = ?next, "Pipeline transition");
    stages.push(next);
}
