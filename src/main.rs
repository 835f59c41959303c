//! Gavel main entry point
//!
//! Command-line interface for scraping marketplace sold listings.

use anyhow::bail;
use clap::Parser;
use gavel::config::load_config;
use gavel::output::{print_summary, save_to_json};
use gavel::{Config, SoldListingsScraper};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Gavel: a resilient scraper for marketplace sold listings
///
/// Fetches sold-listing search results page by page, pacing requests to
/// stay under the host's abuse thresholds, and writes the collected
/// records to a JSON file.
#[derive(Parser, Debug)]
#[command(name = "gavel")]
#[command(version = "0.1.0")]
#[command(about = "Scrape marketplace sold listings", long_about = None)]
struct Cli {
    /// Search query (e.g. "one piece tcg OP01")
    #[arg(short, long)]
    query: Option<String>,

    /// One Piece TCG set code shorthand (e.g. "OP01")
    #[arg(short, long, conflicts_with = "query")]
    set: Option<String>,

    /// Maximum number of pages to scrape
    #[arg(short = 'p', long)]
    max_pages: Option<u32>,

    /// Maximum number of listings to collect
    #[arg(short = 'l', long)]
    max_listings: Option<usize>,

    /// Output directory for JSON files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Path to TOML configuration file (defaults apply without one)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // Config file is optional; CLI flags override individual fields
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)?
        }
        None => Config::default(),
    };

    if let Some(max_pages) = cli.max_pages {
        config.scraper.max_pages = max_pages;
    }
    if let Some(max_listings) = cli.max_listings {
        config.scraper.max_listings = Some(max_listings);
    }
    if let Some(output_dir) = &cli.output_dir {
        config.output.directory = output_dir.display().to_string();
    }

    let mut scraper = SoldListingsScraper::new(&config);

    let result = match (&cli.query, &cli.set) {
        (Some(query), _) => scraper.scrape(query).await?,
        (None, Some(set_code)) => scraper.scrape_set(set_code).await?,
        (None, None) => bail!("either --query or --set is required"),
    };

    let output_path = save_to_json(&result, Path::new(&config.output.directory), None)?;

    print_summary(&result);
    println!("  Output file:    {}", output_path.display());

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gavel=info,warn"),
            1 => EnvFilter::new("gavel=debug,info"),
            2 => EnvFilter::new("gavel=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
