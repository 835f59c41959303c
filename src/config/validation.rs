use crate::config::types::{Config, OutputConfig, ScraperConfig, SearchConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_search_config(&config.search)?;
    validate_output_config(&config.output)?;

    if let Some(api) = &config.api {
        if api.client_id.is_empty() || api.client_secret.is_empty() {
            return Err(ConfigError::Validation(
                "api client-id and client-secret cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates scraper behavior configuration
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.requests_per_minute <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "requests-per-minute must be > 0, got {}",
            config.requests_per_minute
        )));
    }

    if config.burst_size < 1 {
        return Err(ConfigError::Validation(format!(
            "burst-size must be >= 1, got {}",
            config.burst_size
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if let Some(max_listings) = config.max_listings {
        if max_listings < 1 {
            return Err(ConfigError::Validation(format!(
                "max-listings must be >= 1, got {}",
                max_listings
            )));
        }
    }

    if config.items_per_page < 1 || config.items_per_page > 240 {
        return Err(ConfigError::Validation(format!(
            "items-per-page must be between 1 and 240, got {}",
            config.items_per_page
        )));
    }

    if config.session_requests < 1 {
        return Err(ConfigError::Validation(format!(
            "session-requests must be >= 1, got {}",
            config.session_requests
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates search endpoint configuration
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url must use HTTP or HTTPS, got '{}'",
            url.scheme()
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}
