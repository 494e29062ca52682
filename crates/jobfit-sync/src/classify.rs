use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jobfit_core::{ApplicantProfile, JobListing};
use jobfit_llm::{ChatModel, ChatRequest, LlmError, Message};
use jobfit_storage::ListingStore;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::prompt::{build_prompt, parse_verdict};
use crate::schedule::{BatchScheduler, ClassifyReport, StatusUpdater};

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),
}

/// Asks the model one yes/no question per listing.
pub struct Classifier {
    model: Arc<dyn ChatModel>,
    model_name: String,
    profile: ApplicantProfile,
}

impl Classifier {
    pub fn new(
        model: Arc<dyn ChatModel>,
        model_name: impl Into<String>,
        profile: ApplicantProfile,
    ) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            profile,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub async fn classify(&self, listing: &JobListing) -> Result<bool, ClassificationError> {
        let request = ChatRequest::new(self.model_name.as_str())
            .temperature(0.0)
            .message(Message::user(build_prompt(listing, &self.profile)));
        let response = self.model.chat(request).await?;
        let verdict = parse_verdict(&response.content);
        debug!(id = %listing.id, reply = %response.content.trim(), verdict, "classified listing");
        Ok(verdict)
    }
}

#[derive(Debug, Serialize)]
pub struct ClassifySummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub model: String,
    /// Listings in the store when the run started.
    pub stored: usize,
    /// Listings left out because they already had a verdict.
    pub skipped: usize,
    #[serde(skip)]
    pub report: ClassifyReport,
}

/// Reads the whole store once, then classifies it chunk by chunk.
pub struct ClassifyPipeline {
    store: Arc<dyn ListingStore>,
    classifier: Classifier,
    scheduler: BatchScheduler,
    pending_only: bool,
}

impl ClassifyPipeline {
    pub fn new(store: Arc<dyn ListingStore>, classifier: Classifier, chunk_size: usize) -> Self {
        Self {
            store,
            classifier,
            scheduler: BatchScheduler::new(chunk_size),
            pending_only: false,
        }
    }

    pub fn pending_only(mut self, pending_only: bool) -> Self {
        self.pending_only = pending_only;
        self
    }

    pub async fn run(&self) -> Result<ClassifySummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("classify", %run_id, model = %self.classifier.model_name());
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<ClassifySummary> {
        let started_at = Utc::now();
        let listings = self
            .store
            .list_all()
            .await
            .context("loading listings to classify")?;
        let stored = listings.len();

        let listings: Vec<JobListing> = if self.pending_only {
            listings
                .into_iter()
                .filter(|l| l.suitability.is_none())
                .collect()
        } else {
            listings
        };
        let skipped = stored - listings.len();
        info!(
            stored,
            skipped,
            chunk_size = self.scheduler.chunk_size(),
            "classification started"
        );

        let updater = StatusUpdater::new(self.store.clone());
        let report = self
            .scheduler
            .run(&listings, &self.classifier, &updater)
            .await;

        info!(
            classified = report.classified(),
            suitable = report.suitable(),
            failed = report.failed(),
            "classification finished"
        );
        Ok(ClassifySummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            model: self.classifier.model_name().to_string(),
            stored,
            skipped,
            report,
        })
    }
}
