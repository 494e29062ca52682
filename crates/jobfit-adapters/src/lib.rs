//! Search index contract, paginated fetching, and hit normalization.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use jobfit_storage::{FetchError, HttpClient};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

mod normalize;
mod paginate;

pub use normalize::{
    normalize_hit, normalize_hits, strip_markup, NormalizeOutcome, RejectedHit, ValidationError,
};
pub use paginate::{FetchOutcome, PageFailure, PaginatedFetcher};

pub const CRATE_NAME: &str = "jobfit-adapters";

pub const DEFAULT_INDEX_NAME: &str = "job_postings";

/// Fixed query sent for every page of an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub index_name: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub facets: Vec<String>,
    /// Outer list is AND, inner lists are OR.
    #[serde(default)]
    pub facet_filters: Vec<Vec<String>>,
    #[serde(default = "default_max_values_per_facet")]
    pub max_values_per_facet: u32,
}

fn default_max_values_per_facet() -> u32 {
    1000
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            index_name: DEFAULT_INDEX_NAME.to_string(),
            query: String::new(),
            facets: [
                "*",
                "city.work_country_name",
                "position.name",
                "industries.vertical_name",
                "experience",
                "job_type.name",
                "is_salary_visible",
                "has_equity",
                "currency.currency_code",
                "salary_min",
                "taxonomies.slug",
            ]
            .into_iter()
            .map(ToString::to_string)
            .collect(),
            facet_filters: vec![vec!["city.work_country_name:Indonesia".to_string()]],
            max_values_per_facet: default_max_values_per_facet(),
        }
    }
}

/// Read a YAML query definition, or fall back to the built-in one when the file is absent.
pub fn load_search_query(path: impl AsRef<Path>) -> Result<SearchQuery> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(SearchQuery::default());
    }
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// One page of raw hits plus whatever paging metadata the index reports.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    pub hits: Vec<JsonValue>,
    pub page: u32,
    pub nb_pages: Option<u32>,
    pub nb_hits: Option<u64>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn query_page(
        &self,
        query: &SearchQuery,
        page: u32,
        hits_per_page: u32,
    ) -> Result<SearchPage, FetchError>;
}

#[derive(Debug, Clone)]
pub struct AlgoliaConfig {
    pub host: String,
    pub app_id: String,
    pub api_key: String,
}

impl AlgoliaConfig {
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        let app_id = app_id.into();
        Self {
            host: format!("https://{}-dsn.algolia.net", app_id.to_ascii_lowercase()),
            app_id,
            api_key: api_key.into(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlgoliaResponse {
    #[serde(default)]
    hits: Vec<JsonValue>,
    #[serde(default)]
    page: u32,
    nb_pages: Option<u32>,
    nb_hits: Option<u64>,
}

/// Algolia-style REST search index.
#[derive(Debug, Clone)]
pub struct AlgoliaSearchIndex {
    http: HttpClient,
    config: AlgoliaConfig,
}

impl AlgoliaSearchIndex {
    pub fn new(http: HttpClient, config: AlgoliaConfig) -> Self {
        Self { http, config }
    }

    pub fn query_url(&self, index_name: &str) -> String {
        format!(
            "{}/1/indexes/{}/query",
            self.config.host.trim_end_matches('/'),
            index_name
        )
    }
}

fn algolia_request_body(query: &SearchQuery, page: u32, hits_per_page: u32) -> JsonValue {
    json!({
        "query": query.query,
        "hitsPerPage": hits_per_page,
        "page": page,
        "facets": query.facets,
        "facetFilters": query.facet_filters,
        "maxValuesPerFacet": query.max_values_per_facet,
        "tagFilters": "",
    })
}

#[async_trait]
impl SearchIndex for AlgoliaSearchIndex {
    async fn query_page(
        &self,
        query: &SearchQuery,
        page: u32,
        hits_per_page: u32,
    ) -> Result<SearchPage, FetchError> {
        let url = self.query_url(&query.index_name);
        let body = algolia_request_body(query, page, hits_per_page);
        let headers = [
            ("accept", "application/json"),
            ("x-algolia-application-id", self.config.app_id.as_str()),
            ("x-algolia-api-key", self.config.api_key.as_str()),
        ];
        let resp: AlgoliaResponse = self.http.post_json(&url, &headers, &body).await?;
        Ok(SearchPage {
            hits: resp.hits,
            page: resp.page,
            nb_pages: resp.nb_pages,
            nb_hits: resp.nb_hits,
        })
    }
}
