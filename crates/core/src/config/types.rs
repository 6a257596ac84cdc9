use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use super::ConfigError;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Remote site layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    /// Origin that relative links are resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// First page of the paginated album index.
    #[serde(default = "default_first_page")]
    pub first_page: String,
    /// Path prefix in front of every album slug.
    #[serde(default = "default_album_path_prefix")]
    pub album_path_prefix: String,
}

impl SiteConfig {
    pub fn base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::ValidationError(format!("site.base_url: {}", e)))
    }

    pub fn start(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.first_page)
            .map_err(|e| ConfigError::ValidationError(format!("site.first_page: {}", e)))
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            first_page: default_first_page(),
            album_path_prefix: default_album_path_prefix(),
        }
    }
}

fn default_base_url() -> String {
    "https://downloads.khinsider.com".to_string()
}

fn default_first_page() -> String {
    "https://downloads.khinsider.com/game-soundtracks?page=1".to_string()
}

fn default_album_path_prefix() -> String {
    "/game-soundtracks/album/".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("khinsider.db")
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Client-side pacing, 0 disables it.
    #[serde(default)]
    pub requests_per_minute: u32,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            requests_per_minute: 0,
            retry: RetryConfig::default(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("ostcat/{}", env!("CARGO_PKG_VERSION"))
}

/// Detail-page fetch queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Number of concurrent fetch workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum number of pending URLs.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            capacity: default_capacity(),
        }
    }
}

fn default_workers() -> usize {
    2
}

fn default_capacity() -> usize {
    10_000
}

/// Record store configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}
