//! Gavel: a resilient scraper for marketplace sold listings
//!
//! This crate collects structured sold-listing records from an HTML search
//! results page, pacing its requests to stay under the host's abuse
//! thresholds, detecting challenge pages, and assembling a deduplicated
//! result set across pages.

pub mod api;
pub mod config;
pub mod listing;
pub mod output;
pub mod scraper;

use thiserror::Error;

/// Main error type for Gavel operations
#[derive(Debug, Error)]
pub enum GavelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error for {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Rate limited (429) by {url}")]
    RateLimited { url: String },

    #[error("Challenge page detected at {url}")]
    Blocked { url: String },

    #[error("Retries exhausted for {url}")]
    RetriesExhausted { url: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GavelError {
    /// Whether this error comes from the block/challenge heuristic.
    ///
    /// A block ends the whole scrape run; every other fetch error only
    /// costs the current page.
    pub fn is_block(&self) -> bool {
        matches!(self, GavelError::Blocked { .. })
    }
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

/// Result type alias for Gavel operations
pub type Result<T> = std::result::Result<T, GavelError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use listing::{ListingRecord, ScrapeResult, StopReason};
pub use scraper::{RateLimiter, SoldListingsScraper};
