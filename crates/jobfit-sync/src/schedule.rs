use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use jobfit_core::JobListing;
use jobfit_storage::{ListingStore, StoreError};
use tracing::{debug, info_span, warn, Instrument};

use crate::classify::{ClassificationError, Classifier};

/// Writes verdicts back by id.
pub struct StatusUpdater {
    store: Arc<dyn ListingStore>,
}

impl StatusUpdater {
    pub fn new(store: Arc<dyn ListingStore>) -> Self {
        Self { store }
    }

    pub async fn apply(&self, id: &str, suitable: bool) -> Result<(), StoreError> {
        self.store.set_suitability(id, suitable).await?;
        debug!(id, suitable, "verdict stored");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict<'a> {
    pub id: &'a str,
    pub suitable: bool,
}

#[derive(Debug)]
pub enum ListingFailure {
    Classify {
        id: String,
        error: ClassificationError,
    },
    Update {
        id: String,
        error: StoreError,
    },
}

impl ListingFailure {
    pub fn id(&self) -> &str {
        match self {
            ListingFailure::Classify { id, .. } | ListingFailure::Update { id, .. } => id,
        }
    }
}

impl fmt::Display for ListingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingFailure::Classify { error, .. } => write!(f, "classification: {error}"),
            ListingFailure::Update { error, .. } => write!(f, "storing verdict: {error}"),
        }
    }
}

#[derive(Debug)]
pub struct ChunkReport {
    pub index: usize,
    pub size: usize,
    /// `(id, suitable)` for every verdict that reached the store.
    pub verdicts: Vec<(String, bool)>,
    pub failures: Vec<ListingFailure>,
}

#[derive(Debug, Default)]
pub struct ClassifyReport {
    pub chunks: Vec<ChunkReport>,
}

impl ClassifyReport {
    pub fn classified(&self) -> usize {
        self.chunks.iter().map(|c| c.verdicts.len()).sum()
    }

    pub fn suitable(&self) -> usize {
        self.verdicts().filter(|v| v.suitable).count()
    }

    pub fn failed(&self) -> usize {
        self.chunks.iter().map(|c| c.failures.len()).sum()
    }

    pub fn verdicts(&self) -> impl Iterator<Item = Verdict<'_>> {
        self.chunks.iter().flat_map(|c| {
            c.verdicts.iter().map(|(id, suitable)| Verdict {
                id,
                suitable: *suitable,
            })
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &ListingFailure> {
        self.chunks.iter().flat_map(|c| c.failures.iter())
    }
}

/// Classifies listings in consecutive fixed-size chunks. Chunks never overlap;
/// within one chunk every model call is in flight at once.
#[derive(Debug, Clone, Copy)]
pub struct BatchScheduler {
    chunk_size: usize,
}

impl BatchScheduler {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub async fn run(
        &self,
        listings: &[JobListing],
        classifier: &Classifier,
        updater: &StatusUpdater,
    ) -> ClassifyReport {
        let mut report = ClassifyReport::default();
        for (index, chunk) in listings.chunks(self.chunk_size).enumerate() {
            let span = info_span!("classify_chunk", chunk = index, size = chunk.len());
            let chunk_report = run_chunk(index, chunk, classifier, updater)
                .instrument(span)
                .await;
            report.chunks.push(chunk_report);
        }
        report
    }
}

async fn run_chunk(
    index: usize,
    chunk: &[JobListing],
    classifier: &Classifier,
    updater: &StatusUpdater,
) -> ChunkReport {
    let outcomes = join_all(
        chunk
            .iter()
            .map(|listing| async move { (listing, classifier.classify(listing).await) }),
    )
    .await;

    let mut report = ChunkReport {
        index,
        size: chunk.len(),
        verdicts: Vec::with_capacity(chunk.len()),
        failures: Vec::new(),
    };

    for (listing, outcome) in outcomes {
        let id = listing.id.clone();
        match outcome {
            Ok(suitable) => match updater.apply(&id, suitable).await {
                Ok(()) => report.verdicts.push((id, suitable)),
                Err(error) => {
                    warn!(id = %id, error = %error, "failed to store verdict");
                    report.failures.push(ListingFailure::Update { id, error });
                }
            },
            Err(error) => {
                warn!(id = %id, error = %error, "classification failed");
                report.failures.push(ListingFailure::Classify { id, error });
            }
        }
    }

    debug!(
        verdicts = report.verdicts.len(),
        failures = report.failures.len(),
        "chunk finished"
    );
    report
}
