//! Configuration module for Gavel
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every section has defaults, so a config file is optional; CLI
//! flags override individual fields. The scraping core consumes the
//! resulting values as plain constructor parameters and never touches the
//! process environment.

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Config, OutputConfig, ScraperConfig, SearchConfig};

// Re-export parser functions
pub use parser::load_config;
pub use validation::validate;
