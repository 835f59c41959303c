//! Scraping core: rate limiting, fetching, extraction, orchestration
//!
//! The modules here form the acquisition pipeline:
//! - `limiter` bounds the outbound request rate
//! - `fetcher` issues paced, identity-rotated requests and classifies
//!   responses, retrying with escalating backoff
//! - `extractor` turns page markup into listing records
//! - `orchestrator` paginates, deduplicates, and decides when to stop

mod extractor;
mod fetcher;
mod limiter;
mod orchestrator;

pub use extractor::{extract_page, PageExtract};
pub use fetcher::{
    build_search_url, default_block_predicate, BlockPredicate, FetchPolicy, PageFetcher,
};
pub use limiter::RateLimiter;
pub use orchestrator::{CancelHandle, SoldListingsScraper};
