use crate::config::types::{ArchiveConfig, Config, CrawlerConfig, DownloaderConfig, UserAgentConfig};
use crate::ConfigError;
use std::time::Duration;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_archive_config(&config.archive)?;
    validate_crawler_config(&config.crawler)?;
    validate_downloader_config(&config.downloader)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

/// Validates archive endpoints
fn validate_archive_config(config: &ArchiveConfig) -> Result<(), ConfigError> {
    validate_http_url("archive root", &config.root)?;
    validate_http_url("cdx endpoint", &config.cdx_endpoint())?;

    if config.cdx_page_size == 0 {
        return Err(ConfigError::Validation(
            "cdx_page_size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_rate("crawler requests_per_second", config.requests_per_second)?;

    if config.burst_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "burst_limit must be >= 1, got {}",
            config.burst_limit
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    Ok(())
}

/// Validates downloader configuration
fn validate_downloader_config(config: &DownloaderConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    validate_rate("downloader requests_per_second", config.requests_per_second)
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

/// Rates must be finite, strictly positive, and give a representable delay
pub(crate) fn validate_rate(name: &str, rate: f64) -> Result<(), ConfigError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be a positive number, got {}",
            name, rate
        )));
    }

    if Duration::try_from_secs_f64(1.0 / rate).is_err() {
        return Err(ConfigError::Validation(format!(
            "{} is too small, got {}",
            name, rate
        )));
    }
    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use HTTP or HTTPS",
            name, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            name, value
        )));
    }

    Ok(())
}
