use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobfit_llm::OllamaClient;
use jobfit_storage::{ListingStore, MemoryListingStore, PgListingStore};
use jobfit_sync::{Classifier, ClassifyPipeline, IngestPipeline, PipelineConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "jobfit")]
#[command(about = "Ingest job listings and screen them against an applicant profile")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch every page from the search index and upsert the listings.
    Ingest {
        /// Fetch and normalize into memory without touching the database.
        #[arg(long)]
        dry_run: bool,
    },
    /// Ask the model about every stored listing and record the verdicts.
    Classify {
        /// Only listings that have no verdict yet.
        #[arg(long)]
        pending_only: bool,
        /// Concurrent model calls per chunk (overrides CLASSIFY_CHUNK_SIZE).
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Apply database migrations.
    Migrate,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn connect(config: &PipelineConfig) -> Result<PgListingStore> {
    PgListingStore::connect(&config.database_url, 5)
        .await
        .context("connecting to the listing database")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();

    match cli.command {
        Commands::Ingest { dry_run } => {
            let store: Arc<dyn ListingStore> = if dry_run {
                Arc::new(MemoryListingStore::new())
            } else {
                Arc::new(connect(&config).await?)
            };
            let summary = IngestPipeline::from_config(&config, store)?.run().await;
            println!(
                "ingest complete: run_id={} pages={} fetched={} normalized={} rejected={} duplicates={} persisted={} failed_batches={}{}",
                summary.run_id,
                summary.pages_requested,
                summary.fetched,
                summary.normalized,
                summary.rejected,
                summary.duplicates,
                summary.persisted,
                summary.failed_batches,
                if dry_run { " (dry run)" } else { "" },
            );
            if let (Some(page), Some(error)) = (summary.truncated_at_page, &summary.fetch_error) {
                println!("fetch stopped at page {page}: {error}");
            }
        }
        Commands::Classify {
            pending_only,
            chunk_size,
        } => {
            let profile = config.load_profile().await?;
            let model = OllamaClient::new(config.ollama_base_url.clone(), config.model_timeout())?;
            let store = Arc::new(connect(&config).await?);
            let classifier = Classifier::new(Arc::new(model), config.model_name.clone(), profile);

            let summary = ClassifyPipeline::new(
                store,
                classifier,
                chunk_size.unwrap_or(config.chunk_size),
            )
            .pending_only(pending_only)
            .run()
            .await?;

            println!(
                "classify complete: run_id={} model={} stored={} skipped={} classified={} suitable={} failed={}",
                summary.run_id,
                summary.model,
                summary.stored,
                summary.skipped,
                summary.report.classified(),
                summary.report.suitable(),
                summary.report.failed(),
            );
            for failure in summary.report.failures() {
                println!("  failed {}: {failure}", failure.id());
            }
        }
        Commands::Migrate => {
            let store = connect(&config).await?;
            store.migrate().await.context("running migrations")?;
            tracing::info!("migrations applied");
            println!("migrations applied");
        }
    }

    Ok(())
}
