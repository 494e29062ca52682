//! Listing persistence + HTTP transport utilities for jobfit.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use jobfit_core::JobListing;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

mod memory;
mod pg;

pub use memory::MemoryListingStore;
pub use pg::PgListingStore;

pub const CRATE_NAME: &str = "jobfit-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("listing {0} not found")]
    NotFound(String),
    #[error("stored listing {id} is invalid: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("{0}")]
    Unavailable(String),
}

/// Keyed collection of listings. Per-id write safety is the backend's job.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Insert absent ids, overwrite every ingest-owned field of present ones.
    /// The stored verdict is never touched. Returns the number of rows written.
    async fn upsert_batch(&self, listings: &[JobListing]) -> Result<usize, StoreError>;

    /// Every stored listing, ordered by id.
    async fn list_all(&self) -> Result<Vec<JobListing>, StoreError>;

    async fn set_suitability(&self, id: &str, suitable: bool) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },
    #[error("invalid json from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::HttpStatus { status, .. } => StatusCode::from_u16(*status).ok(),
            FetchError::Request(err) => err.status(),
            FetchError::Decode { .. } => None,
        }
    }
}

/// Thin JSON-over-HTTP client. One attempt per call; callers decide what a failure means.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    pub async fn post_json<B, T>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &B,
    ) -> Result<T, FetchError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        debug!(url = %final_url, status = status.as_u16(), "http response");

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
                body,
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
            url: final_url,
            source,
        })
    }
}
