//! Configuration module for Wayback-Archiver
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! All sections are optional, so an absent file means "use the defaults".
//!
//! # Example
//!
//! ```no_run
//! use wayback_archiver::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("archiver.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ArchiveConfig, Config, CrawlerConfig, DownloaderConfig, OutputConfig, PathsConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

use crate::ConfigError;

/// Converts a delay between requests (seconds) into a request rate
///
/// The command line takes `--rate-limit` as seconds between requests.
pub fn rate_from_delay(delay_secs: f64) -> Result<f64, ConfigError> {
    validation::validate_rate("rate limit", delay_secs)?;
    let rate = 1.0 / delay_secs;
    validation::validate_rate("rate limit", rate)?;
    Ok(rate)
}
