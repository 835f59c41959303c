//! Scrape orchestration: page loop, dedup, stop conditions
//!
//! Drives page-by-page acquisition as a single sequential flow — one page
//! fetched and fully processed before the next begins, because concurrent
//! fetching would defeat the pacing strategy. Accumulates deduplicated
//! records across pages and decides when to stop.

use crate::config::{Config, ScraperConfig, SearchConfig};
use crate::listing::{ListingRecord, ScrapeResult, StopReason};
use crate::scraper::extractor::extract_page;
use crate::scraper::fetcher::{build_search_url, FetchPolicy, PageFetcher};
use crate::scraper::RateLimiter;
use crate::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle for aborting an in-progress scrape between pages
///
/// Cancellation is observed at page boundaries, not mid-request; the
/// partial result accumulated so far is returned rather than lost.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Scraper for marketplace sold listings
///
/// Owns the fetch pipeline for the duration of a run; the accumulating
/// result set is owned exclusively here until it is handed back.
pub struct SoldListingsScraper {
    fetcher: PageFetcher,
    search: SearchConfig,
    limits: ScraperConfig,
    cancel: CancelHandle,
}

impl SoldListingsScraper {
    /// Creates a scraper with production pacing derived from the config
    pub fn new(config: &Config) -> Self {
        let policy = FetchPolicy {
            max_retries: config.scraper.max_retries,
            timeout: std::time::Duration::from_secs(config.scraper.timeout_secs),
            session_requests: config.scraper.session_requests,
            ..FetchPolicy::default()
        };
        Self::with_policy(config, policy)
    }

    /// Creates a scraper with an explicit fetch policy
    ///
    /// Rate limiting still comes from the config; the policy carries the
    /// retry bound and every pacing/cooldown duration.
    pub fn with_policy(config: &Config, policy: FetchPolicy) -> Self {
        let limiter = RateLimiter::new(
            config.scraper.requests_per_minute / 60.0,
            config.scraper.burst_size,
        );
        Self {
            fetcher: PageFetcher::new(policy, limiter),
            search: config.search.clone(),
            limits: config.scraper.clone(),
            cancel: CancelHandle::new(),
        }
    }

    /// Replaces the fetcher's block heuristic
    pub fn with_block_predicate(
        mut self,
        predicate: crate::scraper::fetcher::BlockPredicate,
    ) -> Self {
        self.fetcher = self.fetcher.with_block_predicate(predicate);
        self
    }

    /// Returns a handle that aborts the scrape at the next page boundary
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Scrapes sold listings for a search query
    ///
    /// Stop conditions, in priority order after each page: the listing cap
    /// (result truncated to exactly the cap), a block signal from the
    /// fetcher (run ends immediately), no next page, the page limit. A
    /// non-block fetch failure skips that page and the loop advances —
    /// partial results always survive. A run stopped by blocking or
    /// cancellation is still `Ok`: the result carries whatever was
    /// collected and the reason it stopped.
    pub async fn scrape(&mut self, query: &str) -> Result<ScrapeResult> {
        let scraped_at = Utc::now();
        let max_pages = self.limits.max_pages;

        let mut listings: Vec<ListingRecord> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut pages_scraped = 0u32;
        let mut stop_reason = StopReason::MaxPages;

        tracing::info!("Starting scrape for query: {}", query);

        for page in 1..=max_pages {
            if self.cancel.is_cancelled() {
                tracing::info!("Scrape cancelled before page {}", page);
                stop_reason = StopReason::Cancelled;
                break;
            }

            let url = build_search_url(&self.search, query, page, self.limits.items_per_page)?;
            tracing::info!("Scraping page {}...", page);

            let careful = page == 1 && max_pages > 1;
            let body = match self.fetcher.fetch(&url, careful).await {
                Ok(body) => body,
                Err(e) if e.is_block() => {
                    // Retrying past a persistent block only deepens it
                    tracing::warn!("Challenge page on page {}, stopping the run", page);
                    stop_reason = StopReason::Blocked;
                    break;
                }
                Err(e) => {
                    tracing::error!("Error scraping page {}: {}", page, e);
                    continue;
                }
            };

            let extract = extract_page(&body, scraped_at);
            pages_scraped += 1;

            let mut new_on_page = 0usize;
            let mut duplicates = 0usize;
            for record in extract.listings {
                if seen_ids.insert(record.listing_id.clone()) {
                    listings.push(record);
                    new_on_page += 1;
                } else {
                    duplicates += 1;
                }
            }

            tracing::info!(
                "Page {}: {} new listings, {} duplicates (total: {})",
                page,
                new_on_page,
                duplicates,
                listings.len()
            );

            if let Some(cap) = self.limits.max_listings {
                if listings.len() >= cap {
                    listings.truncate(cap);
                    tracing::info!("Reached max listings limit: {}", cap);
                    stop_reason = StopReason::ListingCap;
                    break;
                }
            }

            if !extract.has_next_page {
                // The next-page control and the results caption come from
                // different markup regions; flag a contradiction instead of
                // trusting either
                if let Some(total) = extract.total_results {
                    if (total as usize) > listings.len() {
                        tracing::warn!(
                            "Pagination ended after {} listings but the page claims {} results",
                            listings.len(),
                            total
                        );
                    }
                }
                tracing::info!("No more pages available");
                stop_reason = StopReason::NoNextPage;
                break;
            }
        }

        tracing::info!(
            "Scrape complete: {} listings from {} pages",
            listings.len(),
            pages_scraped
        );

        Ok(ScrapeResult::new(
            query.to_string(),
            listings,
            pages_scraped,
            scraped_at,
            stop_reason,
        ))
    }

    /// Scrapes sold listings for a One Piece TCG set code (e.g. "OP01")
    pub async fn scrape_set(&mut self, set_code: &str) -> Result<ScrapeResult> {
        let query = format!("one piece tcg {}", set_code);
        self.scrape(&query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_handle_roundtrip() {
        let handle = CancelHandle::new();
        assert!(!handle.is_cancelled());

        let clone = handle.clone();
        clone.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_scraper_returns_empty_partial_result() {
        let config = Config::default();
        let mut scraper = SoldListingsScraper::new(&config);
        scraper.cancel_handle().cancel();

        // Cancelled before page 1: no request is ever issued
        let result = scraper.scrape("one piece tcg OP01").await.unwrap();
        assert_eq!(result.pages_scraped, 0);
        assert!(result.listings.is_empty());
        assert_eq!(result.stop_reason, StopReason::Cancelled);
    }
}
