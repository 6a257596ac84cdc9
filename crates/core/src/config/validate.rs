use tokio::sync::Semaphore;

use super::{types::Config, ConfigError, RetryConfig};

/// Largest backlog a bounded tokio channel accepts.
pub const MAX_QUEUE_CAPACITY: usize = Semaphore::MAX_PERMITS;

/// Validate configuration
/// Currently validates:
/// - Site URLs parse and the album prefix is a `/.../` path
/// - Requests have a non-zero timeout
/// - Queue has at least one worker and a backlog within channel limits
/// - Retry policies make at least one attempt and never shrink the delay
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    config.site.base()?;
    config.site.start()?;

    let prefix = &config.site.album_path_prefix;
    if !prefix.starts_with('/') || !prefix.ends_with('/') || prefix.len() < 2 {
        return Err(ConfigError::ValidationError(format!(
            "site.album_path_prefix must start and end with '/': {:?}",
            prefix
        )));
    }

    if config.http.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "http.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.queue.workers == 0 {
        return Err(ConfigError::ValidationError(
            "queue.workers cannot be 0".to_string(),
        ));
    }
    if config.queue.capacity == 0 {
        return Err(ConfigError::ValidationError(
            "queue.capacity cannot be 0".to_string(),
        ));
    }
    if config.queue.capacity > MAX_QUEUE_CAPACITY {
        return Err(ConfigError::ValidationError(format!(
            "queue.capacity cannot exceed {}",
            MAX_QUEUE_CAPACITY
        )));
    }

    validate_retry("http.retry", &config.http.retry)?;
    validate_retry("store.retry", &config.store.retry)?;

    Ok(())
}

fn validate_retry(section: &str, retry: &RetryConfig) -> Result<(), ConfigError> {
    if retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{}.max_attempts cannot be 0",
            section
        )));
    }
    if retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::ValidationError(format!(
            "{}.backoff_multiplier must be >= 1.0",
            section
        )));
    }
    Ok(())
}
