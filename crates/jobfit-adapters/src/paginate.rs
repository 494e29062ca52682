use std::num::NonZeroU32;

use jobfit_storage::FetchError;
use serde_json::Value as JsonValue;
use tracing::{debug, info_span, warn, Instrument};

use crate::{SearchIndex, SearchQuery};

#[derive(Debug)]
pub struct PageFailure {
    pub page: u32,
    pub error: FetchError,
}

/// Hits gathered across pages. When `failure` is set the hits are the pages that
/// succeeded before it; nothing after the failing page was requested.
#[derive(Debug)]
pub struct FetchOutcome {
    pub hits: Vec<JsonValue>,
    pub pages_requested: u32,
    pub failure: Option<PageFailure>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Walks a search index page by page until a short page shows up.
pub struct PaginatedFetcher<'a> {
    index: &'a dyn SearchIndex,
    query: &'a SearchQuery,
    page_size: NonZeroU32,
}

impl<'a> PaginatedFetcher<'a> {
    pub fn new(index: &'a dyn SearchIndex, query: &'a SearchQuery, page_size: NonZeroU32) -> Self {
        Self {
            index,
            query,
            page_size,
        }
    }

    /// Pages are strictly sequential: page n+1 is only requested once page n came
    /// back full. A total that is an exact multiple of the page size therefore
    /// costs one extra request for the empty page that ends the walk.
    pub async fn fetch_all(&self) -> FetchOutcome {
        let per_page = self.page_size.get();
        let mut hits = Vec::new();
        let mut page = 0u32;

        loop {
            let span = info_span!("search_page", index = %self.query.index_name, page);
            match self
                .index
                .query_page(self.query, page, per_page)
                .instrument(span)
                .await
            {
                Ok(result) => {
                    let count = result.hits.len();
                    hits.extend(result.hits);
                    debug!(page, count, total = hits.len(), "fetched search page");

                    if count < per_page as usize {
                        return FetchOutcome {
                            hits,
                            pages_requested: page + 1,
                            failure: None,
                        };
                    }
                    page += 1;
                }
                Err(error) => {
                    warn!(
                        page,
                        kept = hits.len(),
                        error = %error,
                        "search page failed; keeping hits from earlier pages"
                    );
                    return FetchOutcome {
                        hits,
                        pages_requested: page + 1,
                        failure: Some(PageFailure { page, error }),
                    };
                }
            }
        }
    }
}
