use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use jobfit_adapters::{SearchIndex, SearchPage, SearchQuery};
use jobfit_core::{ApplicantProfile, JobListing};
use jobfit_llm::{ChatModel, ChatRequest, ChatResponse, LlmError};
use jobfit_storage::{FetchError, ListingStore, MemoryListingStore};
use jobfit_sync::{Classifier, ClassifyPipeline, IngestPipeline};
use serde_json::Value as JsonValue;

fn fixture_hits() -> Vec<JsonValue> {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let raw = std::fs::read_to_string(root.join("fixtures/search-index/page-0.json"))
        .expect("fixture readable");
    let page: JsonValue = serde_json::from_str(&raw).expect("fixture is json");
    page["hits"].as_array().cloned().expect("hits array")
}

/// Serves a fixed hit list page by page, optionally failing on one page.
struct FixtureIndex {
    hits: Vec<JsonValue>,
    fail_on_page: Option<u32>,
}

#[async_trait]
impl SearchIndex for FixtureIndex {
    async fn query_page(
        &self,
        _query: &SearchQuery,
        page: u32,
        hits_per_page: u32,
    ) -> Result<SearchPage, FetchError> {
        if self.fail_on_page == Some(page) {
            return Err(FetchError::HttpStatus {
                status: 502,
                url: "fixture://search".into(),
                body: "bad gateway".into(),
            });
        }
        let start = (page as usize * hits_per_page as usize).min(self.hits.len());
        let end = (start + hits_per_page as usize).min(self.hits.len());
        Ok(SearchPage {
            hits: self.hits[start..end].to_vec(),
            page,
            nb_pages: None,
            nb_hits: Some(self.hits.len() as u64),
        })
    }
}

/// Suitable for anything titled "Backend".
struct TitleModel;

#[async_trait]
impl ChatModel for TitleModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let prompt = &request.messages[0].content;
        let suitable = prompt
            .lines()
            .any(|l| l.starts_with("Job Title:") && l.contains("Backend"));
        Ok(ChatResponse {
            model: Some(request.model.clone()),
            content: if suitable { "true" } else { "false" }.into(),
        })
    }
}

fn page_size(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).expect("non-zero")
}

fn ingest(store: Arc<MemoryListingStore>, index: FixtureIndex, per_page: u32) -> IngestPipeline {
    IngestPipeline::new(
        Arc::new(index),
        store,
        SearchQuery::default(),
        page_size(per_page),
        500,
    )
}

fn without_verdict(listings: &[JobListing]) -> Vec<JobListing> {
    listings
        .iter()
        .cloned()
        .map(|l| JobListing {
            suitability: None,
            ..l
        })
        .collect()
}

#[tokio::test]
async fn ingest_then_classify_then_reingest() {
    let store = Arc::new(MemoryListingStore::new());
    let index = || FixtureIndex {
        hits: fixture_hits(),
        fail_on_page: None,
    };

    let summary = ingest(store.clone(), index(), 1000).run().await;
    assert!(summary.is_complete());
    assert_eq!(summary.pages_requested, 1);
    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.normalized, 2);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.persisted, 2);
    assert_eq!(store.len().await, 2);
    assert!(store.get("c3d4e5f6-no-company").await.is_none());

    let before = store.list_all().await.expect("list");
    assert!(before.iter().all(|l| l.suitability.is_none()));

    let classifier = Classifier::new(Arc::new(TitleModel), "llama3", ApplicantProfile::new("Go and Postgres"));
    let classified = ClassifyPipeline::new(store.clone(), classifier, 10)
        .run()
        .await
        .expect("classify");
    assert_eq!(classified.report.classified(), 2);
    assert_eq!(classified.report.failed(), 0);

    let after = store.list_all().await.expect("list");
    assert_eq!(without_verdict(&after), before);
    assert_eq!(
        store.get("6f1c2a90-jkt-backend").await.and_then(|l| l.suitability),
        Some(true)
    );
    assert_eq!(
        store.get("9b0e11d4-remote-data").await.and_then(|l| l.suitability),
        Some(false)
    );

    let again = ingest(store.clone(), index(), 1000).run().await;
    assert_eq!(again.persisted, 2);
    assert_eq!(store.list_all().await.expect("list"), after);
}

#[tokio::test]
async fn partial_fetch_is_still_persisted() {
    let store = Arc::new(MemoryListingStore::new());
    let index = FixtureIndex {
        hits: fixture_hits(),
        fail_on_page: Some(1),
    };

    let summary = ingest(store.clone(), index, 1).run().await;

    assert!(!summary.is_complete());
    assert_eq!(summary.truncated_at_page, Some(1));
    assert!(summary
        .fetch_error
        .as_deref()
        .is_some_and(|e| e.contains("502")));
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.persisted, 1);
    assert!(store.get("6f1c2a90-jkt-backend").await.is_some());
}
