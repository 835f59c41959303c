use serde::Deserialize;

/// Main configuration structure for Gavel
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Credentials for the official Finding API (optional; the HTML
    /// scraper needs none)
    #[serde(default)]
    pub api: Option<ApiConfig>,
}

/// Scraper behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Outbound request rate (requests per minute)
    #[serde(rename = "requests-per-minute")]
    pub requests_per_minute: f64,

    /// Token bucket burst capacity
    #[serde(rename = "burst-size")]
    pub burst_size: u32,

    /// Maximum retry attempts per page fetch
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Maximum number of result pages to fetch
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Optional cap on collected listings
    #[serde(rename = "max-listings", default)]
    pub max_listings: Option<usize>,

    /// Listings requested per result page
    #[serde(rename = "items-per-page")]
    pub items_per_page: u32,

    /// Requests served by one session before it is recycled
    #[serde(rename = "session-requests")]
    pub session_requests: u32,

    /// Request timeout in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        // Conservative defaults: ~15 seconds between requests
        Self {
            requests_per_minute: 4.0,
            burst_size: 1,
            max_retries: 5,
            max_pages: 5,
            max_listings: None,
            items_per_page: 120,
            session_requests: 5,
            timeout_secs: 45,
        }
    }
}

/// Search endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search endpoint base URL (overridable so tests can point at a
    /// local server)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Result sort order parameter (13 = most recently ended)
    #[serde(rename = "sort-order")]
    pub sort_order: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.ebay.com/sch/i.html".to_string(),
            sort_order: 13,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory where result JSON files are written
    #[serde(rename = "directory")]
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "data/raw".to_string(),
        }
    }
}

/// Finding API credentials
///
/// Carried in the config file and handed to the API client explicitly;
/// nothing in this crate reads them from the process environment.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(rename = "client-id")]
    pub client_id: String,

    #[serde(rename = "client-secret")]
    pub client_secret: String,
}
