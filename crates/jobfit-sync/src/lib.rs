//! Ingestion and classification runs over a shared listing store.

mod classify;
mod config;
mod ingest;
mod persist;
mod prompt;
mod schedule;

pub use classify::{ClassificationError, ClassifyPipeline, ClassifySummary, Classifier};
pub use config::PipelineConfig;
pub use ingest::{IngestPipeline, IngestSummary};
pub use persist::{FailedBatch, PersistReport, Persister};
pub use prompt::{build_prompt, format_listing, parse_verdict};
pub use schedule::{
    BatchScheduler, ChunkReport, ClassifyReport, ListingFailure, StatusUpdater, Verdict,
};

pub const CRATE_NAME: &str = "jobfit-sync";
