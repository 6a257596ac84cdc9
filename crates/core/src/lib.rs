pub mod catalog;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod fetch;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod retry;
pub mod testing;

pub use catalog::{
    Album, CatalogStats, Image, Platform, RecordStore, SqliteStore, StoreError, Track,
    UpsertOutcome,
};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use crawler::{CatalogCrawler, CrawlError, CrawlReport, DetailExtractor};
pub use extract::{album_id_from_url, parse_detail_page, parse_index_page, SiteLayout};
pub use fetch::{FetchError, HttpFetcher, PageFetcher};
pub use pipeline::{DetailReport, Pipeline, PipelineReport};
pub use queue::{FetchQueue, PageHandler, QueueError, QueueReport, Submission};
pub use retry::RetryPolicy;
