//! Human-readable run summary

use crate::listing::{ScrapeResult, StopReason};

/// Prints a summary of a completed scrape run to stdout
pub fn print_summary(result: &ScrapeResult) {
    println!("\nScrape complete!");
    println!("  Query:          {}", result.query);
    println!("  Total listings: {}", result.total_listings);
    println!("  Pages scraped:  {}", result.pages_scraped);
    println!("  Stopped:        {}", describe_stop(result.stop_reason));

    if let Some(stats) = price_stats(result) {
        println!(
            "  Price range:    ${:.2} - ${:.2} (median ${:.2})",
            stats.min, stats.max, stats.median
        );
    }
}

/// Price spread over a result set
pub struct PriceStats {
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

/// Computes the price spread; `None` for an empty result
pub fn price_stats(result: &ScrapeResult) -> Option<PriceStats> {
    if result.listings.is_empty() {
        return None;
    }

    let mut prices: Vec<f64> = result.listings.iter().map(|record| record.price).collect();
    prices.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Some(PriceStats {
        min: prices[0],
        max: prices[prices.len() - 1],
        median: prices[prices.len() / 2],
    })
}

fn describe_stop(reason: StopReason) -> &'static str {
    match reason {
        StopReason::NoNextPage => "no more pages",
        StopReason::MaxPages => "page limit reached",
        StopReason::ListingCap => "listing cap reached",
        StopReason::Blocked => "challenge page detected",
        StopReason::Cancelled => "cancelled",
    }
}
