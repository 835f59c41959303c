//! Integration tests for the scraper
//!
//! These tests use wiremock to stand in for the marketplace search
//! endpoint and exercise the full scrape cycle end-to-end: pagination,
//! dedup, retry classification, and stop conditions.

use gavel::config::{Config, OutputConfig, ScraperConfig, SearchConfig};
use gavel::scraper::{FetchPolicy, SoldListingsScraper};
use gavel::StopReason;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointed at the mock server
fn create_test_config(server: &MockServer) -> Config {
    Config {
        scraper: ScraperConfig {
            requests_per_minute: 60_000.0, // Effectively unthrottled for testing
            burst_size: 10,
            max_retries: 3,
            max_pages: 5,
            max_listings: None,
            items_per_page: 120,
            session_requests: 5,
            timeout_secs: 5,
        },
        search: SearchConfig {
            base_url: format!("{}/sch/i.html", server.uri()),
            sort_order: 13,
        },
        output: OutputConfig::default(),
        api: None,
    }
}

/// A fetch policy with every deliberate delay zeroed out
fn fast_policy() -> FetchPolicy {
    FetchPolicy {
        max_retries: 3,
        timeout: Duration::from_secs(5),
        session_requests: 5,
        steady_delay: Duration::ZERO,
        steady_jitter: Duration::ZERO,
        careful_delay: Duration::ZERO,
        retry_step: Duration::ZERO,
        careful_jitter: Duration::ZERO,
        rate_limit_cooldown: Duration::ZERO,
        rate_limit_jitter: Duration::ZERO,
        block_cooldown: Duration::ZERO,
        block_jitter: Duration::ZERO,
    }
}

fn test_scraper(config: &Config) -> SoldListingsScraper {
    SoldListingsScraper::with_policy(config, fast_policy())
}

/// One listing card in search results markup
fn card(id: &str, title: &str, price: &str) -> String {
    format!(
        r#"<li class="s-card" data-listingid="{id}">
            <a class="s-card__link" href="https://www.ebay.com/itm/{id}">
                <span class="s-card__title">{title}</span>
            </a>
            <span class="s-card__price">{price}</span>
            <span class="s-card__caption">Sold Jan 15, 2024</span>
            <div class="s-card__attribute-row">Free delivery</div>
        </li>"#
    )
}

/// A search results page wrapping the given cards
fn results_page(cards: &[String], has_next: bool) -> String {
    let pagination = if has_next {
        r#"<a class="pagination__next" href="?_pgn=2">Next</a>"#
    } else {
        ""
    };
    format!(
        r#"<html><body><div class="srp-results"><ul>{}</ul>{}</div></body></html>"#,
        cards.join("\n"),
        pagination
    )
}

fn html_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

#[tokio::test]
async fn test_multi_page_scrape_with_dedup() {
    let mock_server = MockServer::start().await;

    // Page 2: one listing repeated from page 1, one new, no further pages.
    // Mounted before the catch-all page 1 mock so the _pgn match wins.
    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .and(query_param("_pgn", "2"))
        .respond_with(html_response(results_page(
            &[
                card("103", "Third Listing", "$30.00"), // Duplicate of page 1
                card("104", "Fourth Listing", "$40.00"),
            ],
            false,
        )))
        .mount(&mock_server)
        .await;

    // Page 1: three listings, next page available
    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .respond_with(html_response(results_page(
            &[
                card("101", "First Listing", "$10.00"),
                card("102", "Second Listing", "$20.00"),
                card("103", "Third Listing", "$30.00"),
            ],
            true,
        )))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server);
    let mut scraper = test_scraper(&config);
    let result = scraper.scrape("one piece tcg OP01").await.expect("Scrape failed");

    assert_eq!(result.query, "one piece tcg OP01");
    assert_eq!(result.pages_scraped, 2);
    assert_eq!(result.stop_reason, StopReason::NoNextPage);

    // Duplicate id 103 kept once, from its first occurrence
    let ids: Vec<&str> = result
        .listings
        .iter()
        .map(|record| record.listing_id.as_str())
        .collect();
    assert_eq!(ids, vec!["101", "102", "103", "104"]);
    assert_eq!(result.total_listings, 4);
    assert_eq!(result.listings[2].title, "Third Listing");
}

#[tokio::test]
async fn test_challenge_page_stops_run_without_error() {
    let mock_server = MockServer::start().await;

    // Every response is an interruption page; the fetcher exhausts its
    // retries and the run stops with nothing collected
    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .respond_with(html_response(
            "<html><body>Pardon our interruption</body></html>".to_string(),
        ))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server);
    let mut scraper = test_scraper(&config);
    let result = scraper.scrape("one piece tcg OP01").await.expect("Scrape failed");

    assert_eq!(result.pages_scraped, 0);
    assert!(result.listings.is_empty());
    assert_eq!(result.total_listings, 0);
    assert_eq!(result.stop_reason, StopReason::Blocked);
}

#[tokio::test]
async fn test_block_mid_run_keeps_partial_results() {
    let mock_server = MockServer::start().await;

    // Page 2 serves a challenge page on every attempt
    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .and(query_param("_pgn", "2"))
        .respond_with(html_response(
            "<html><body>please complete this captcha</body></html>".to_string(),
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .respond_with(html_response(results_page(
            &[
                card("201", "Listing A", "$15.00"),
                card("202", "Listing B", "$25.00"),
            ],
            true,
        )))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server);
    let mut scraper = test_scraper(&config);
    let result = scraper.scrape("one piece tcg OP02").await.expect("Scrape failed");

    assert_eq!(result.pages_scraped, 1);
    assert_eq!(result.total_listings, 2);
    assert_eq!(result.stop_reason, StopReason::Blocked);
}

#[tokio::test]
async fn test_listing_cap_truncates_exactly() {
    let mock_server = MockServer::start().await;

    // Three pages of 30 unique listings each
    let cards_for = |page: u32| -> Vec<String> {
        (0..30)
            .map(|i| {
                let id = (page - 1) * 30 + i + 1;
                card(&id.to_string(), &format!("Item {}", id), "$5.00")
            })
            .collect()
    };

    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .and(query_param("_pgn", "2"))
        .respond_with(html_response(results_page(&cards_for(2), true)))
        .mount(&mock_server)
        .await;

    // Page 3 must never be requested once the cap is hit on page 2
    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .and(query_param("_pgn", "3"))
        .respond_with(html_response(results_page(&cards_for(3), false)))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .respond_with(html_response(results_page(&cards_for(1), true)))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server);
    config.scraper.max_listings = Some(50);

    let mut scraper = test_scraper(&config);
    let result = scraper.scrape("one piece tcg OP03").await.expect("Scrape failed");

    // Truncated to exactly the cap, in discovery order
    assert_eq!(result.total_listings, 50);
    assert_eq!(result.listings.len(), 50);
    assert_eq!(result.listings[0].listing_id, "1");
    assert_eq!(result.listings[49].listing_id, "50");
    assert_eq!(result.pages_scraped, 2);
    assert_eq!(result.stop_reason, StopReason::ListingCap);
}

#[tokio::test]
async fn test_failing_page_is_skipped_and_run_continues() {
    let mock_server = MockServer::start().await;

    // Page 2 fails on every attempt with a server error
    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .and(query_param("_pgn", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .and(query_param("_pgn", "3"))
        .respond_with(html_response(results_page(
            &[card("303", "Page Three Item", "$33.00")],
            false,
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .respond_with(html_response(results_page(
            &[card("301", "Page One Item", "$11.00")],
            true,
        )))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server);
    let mut scraper = test_scraper(&config);
    let result = scraper.scrape("one piece tcg OP04").await.expect("Scrape failed");

    // Pages 1 and 3 counted; the failed page 2 is skipped, not fatal
    assert_eq!(result.pages_scraped, 2);
    let ids: Vec<&str> = result
        .listings
        .iter()
        .map(|record| record.listing_id.as_str())
        .collect();
    assert_eq!(ids, vec!["301", "303"]);
    assert_eq!(result.stop_reason, StopReason::NoNextPage);
}

#[tokio::test]
async fn test_recovers_from_rate_limit_response() {
    let mock_server = MockServer::start().await;

    // First attempt is throttled; the retry succeeds
    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .respond_with(html_response(results_page(
            &[card("401", "Recovered Item", "$44.00")],
            false,
        )))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server);
    let mut scraper = test_scraper(&config);
    let result = scraper.scrape("one piece tcg OP05").await.expect("Scrape failed");

    assert_eq!(result.pages_scraped, 1);
    assert_eq!(result.total_listings, 1);
    assert_eq!(result.listings[0].listing_id, "401");
}

#[tokio::test]
async fn test_page_limit_stops_run() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .and(query_param("_pgn", "2"))
        .respond_with(html_response(results_page(
            &[card("502", "Second", "$2.00")],
            true,
        )))
        .mount(&mock_server)
        .await;

    // Every page claims a further page exists; only the limit stops the run
    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .respond_with(html_response(results_page(
            &[card("501", "First", "$1.00")],
            true,
        )))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server);
    config.scraper.max_pages = 2;

    let mut scraper = test_scraper(&config);
    let result = scraper.scrape("one piece tcg OP06").await.expect("Scrape failed");

    assert_eq!(result.pages_scraped, 2);
    assert_eq!(result.total_listings, 2);
    assert_eq!(result.stop_reason, StopReason::MaxPages);
}

#[tokio::test]
async fn test_set_code_search_builds_full_query() {
    let mock_server = MockServer::start().await;

    // The set code is expanded into the full search phrase
    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .and(query_param("_nkw", "one piece tcg OP01"))
        .respond_with(html_response(results_page(
            &[card("601", "OP01 Booster Box", "$99.99")],
            false,
        )))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server);
    let mut scraper = test_scraper(&config);
    let result = scraper.scrape_set("OP01").await.expect("Scrape failed");

    assert_eq!(result.query, "one piece tcg OP01");
    assert_eq!(result.total_listings, 1);
}
