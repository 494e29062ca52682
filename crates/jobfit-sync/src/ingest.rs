use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use jobfit_adapters::{
    load_search_query, normalize_hits, AlgoliaSearchIndex, PaginatedFetcher, SearchIndex,
    SearchQuery,
};
use jobfit_storage::{HttpClient, ListingStore};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{PipelineConfig, Persister};

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages_requested: u32,
    pub fetched: usize,
    pub normalized: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub persisted: usize,
    pub failed_batches: usize,
    /// Page whose failure cut the fetch short, with the transport error.
    pub truncated_at_page: Option<u32>,
    pub fetch_error: Option<String>,
}

impl IngestSummary {
    pub fn is_complete(&self) -> bool {
        self.truncated_at_page.is_none() && self.failed_batches == 0
    }
}

/// Fetch every page, normalize, upsert. Partial fetches are still persisted.
pub struct IngestPipeline {
    index: Arc<dyn SearchIndex>,
    store: Arc<dyn ListingStore>,
    query: SearchQuery,
    page_size: NonZeroU32,
    batch_size: usize,
}

impl IngestPipeline {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        store: Arc<dyn ListingStore>,
        query: SearchQuery,
        page_size: NonZeroU32,
        batch_size: usize,
    ) -> Self {
        Self {
            index,
            store,
            query,
            page_size,
            batch_size,
        }
    }

    /// Wires the Algolia index and the query file named by `config`.
    pub fn from_config(config: &PipelineConfig, store: Arc<dyn ListingStore>) -> Result<Self> {
        let http = HttpClient::new(config.http_client_config())?;
        let index = AlgoliaSearchIndex::new(http, config.algolia_config()?);
        let query = load_search_query(&config.search_query_path)?;
        Ok(Self::new(
            Arc::new(index),
            store,
            query,
            config.page_size,
            config.batch_size,
        ))
    }

    pub async fn run(&self) -> IngestSummary {
        let run_id = Uuid::new_v4();
        let span = info_span!("ingest", %run_id, index = %self.query.index_name);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> IngestSummary {
        let started_at = Utc::now();
        info!(page_size = self.page_size.get(), "ingest started");

        let fetched = PaginatedFetcher::new(self.index.as_ref(), &self.query, self.page_size)
            .fetch_all()
            .await;
        if let Some(failure) = &fetched.failure {
            warn!(
                page = failure.page,
                kept = fetched.hits.len(),
                "fetch truncated; persisting partial snapshot"
            );
        }

        let normalized = normalize_hits(&fetched.hits);
        let persisted = Persister::new(self.store.as_ref(), self.batch_size)
            .persist(&normalized.listings)
            .await;

        let summary = IngestSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            pages_requested: fetched.pages_requested,
            fetched: fetched.hits.len(),
            normalized: normalized.listings.len(),
            rejected: normalized.rejected.len(),
            duplicates: normalized.duplicates,
            persisted: persisted.written,
            failed_batches: persisted.failed_batches.len(),
            truncated_at_page: fetched.failure.as_ref().map(|f| f.page),
            fetch_error: fetched.failure.as_ref().map(|f| f.error.to_string()),
        };

        info!(
            fetched = summary.fetched,
            normalized = summary.normalized,
            rejected = summary.rejected,
            persisted = summary.persisted,
            failed_batches = summary.failed_batches,
            complete = summary.is_complete(),
            "ingest finished"
        );
        summary
    }
}
