mod metrics;
mod summary;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ostcat_core::{
    load_config, validate_config, HttpFetcher, PageFetcher, Pipeline, RecordStore, SqliteStore,
};

use summary::RunSummary;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Run one crawl. Returns whether both phases completed.
async fn run() -> Result<bool> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("ostcat {}", VERSION);

    // Determine config path
    let config_path = std::env::var("OSTCAT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("ostcat.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Database path: {:?}", config.database.path);
    info!("Start page: {}", config.site.first_page);
    info!(
        "Fetch queue: {} workers, capacity {}",
        config.queue.workers, config.queue.capacity
    );

    let store: Arc<dyn RecordStore> = Arc::new(
        SqliteStore::new(&config.database.path).context("Failed to open album catalog")?,
    );
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.http));

    let pipeline = Pipeline::from_config(&config, fetcher, Arc::clone(&store))
        .context("Failed to set up crawl pipeline")?;

    let started_at = Utc::now();
    let report = pipeline.run().await;
    let finished_at = Utc::now();

    let stats = match store.stats() {
        Ok(stats) => {
            metrics::CATALOG_ALBUMS.set(stats.total_albums as i64);
            metrics::CATALOG_TRACKS.set(stats.total_tracks as i64);
            Some(stats)
        }
        Err(e) => {
            warn!("Failed to read catalog stats: {}", e);
            None
        }
    };

    let summary = RunSummary::new(&report, stats, started_at, finished_at);
    summary.log();
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to serialize run summary")?
    );
    debug!("Final metrics:\n{}", metrics::encode_metrics());

    Ok(report.is_complete())
}
