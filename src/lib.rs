//! Division-Crawler: administrative division harvester
//!
//! This crate walks the five-level administrative division tables published by
//! the national statistics site (province → city → county → town → village),
//! one concurrent task per province, and stores the flattened village rows in
//! SQLite.

pub mod config;
pub mod crawler;
pub mod division;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for Division-Crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] crawler::FetchFailure),

    #[error("HTML parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Root page {url} lists no provinces")]
    NoProvinces { url: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while reading a division table row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{marker} row has {found} cells, expected at least {expected}")]
    MissingCells {
        marker: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("{marker} row code '{code}' is not a numeric code of at least {width} digits")]
    BadCode {
        marker: &'static str,
        code: String,
        width: usize,
    },

    #[error("{marker} row link '{href}' cannot be resolved: {reason}")]
    BadLink {
        marker: &'static str,
        href: String,
        reason: String,
    },

    #[error("Invalid selector '{0}'")]
    Selector(String),
}

/// Result type alias for Division-Crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use division::{DivisionNode, Level};
