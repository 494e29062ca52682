use jobfit_core::JobListing;
use jobfit_storage::{ListingStore, StoreError};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct FailedBatch {
    pub index: usize,
    pub ids: Vec<String>,
    pub error: StoreError,
}

#[derive(Debug, Default)]
pub struct PersistReport {
    pub batches: usize,
    pub written: usize,
    pub failed_batches: Vec<FailedBatch>,
}

impl PersistReport {
    pub fn failed_listings(&self) -> usize {
        self.failed_batches.iter().map(|b| b.ids.len()).sum()
    }
}

/// Upserts listings in fixed-size batches, one store call per batch.
pub struct Persister<'a> {
    store: &'a dyn ListingStore,
    batch_size: usize,
}

impl<'a> Persister<'a> {
    pub fn new(store: &'a dyn ListingStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn persist(&self, listings: &[JobListing]) -> PersistReport {
        let mut report = PersistReport::default();

        for (index, batch) in listings.chunks(self.batch_size).enumerate() {
            report.batches += 1;
            match self.store.upsert_batch(batch).await {
                Ok(written) => {
                    debug!(batch = index, rows = written, "persisted batch");
                    report.written += written;
                }
                Err(error) => {
                    warn!(batch = index, size = batch.len(), error = %error, "batch upsert failed");
                    report.failed_batches.push(FailedBatch {
                        index,
                        ids: batch.iter().map(|l| l.id.clone()).collect(),
                        error,
                    });
                }
            }
        }

        report
    }
}
