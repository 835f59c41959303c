//! HTTP fetch pipeline with anti-block heuristics
//!
//! This module issues one logical "fetch a URL" request at a time:
//! - acquires a rate limiter token and applies human-pacing delays
//! - rotates the request identity (User-Agent and header fingerprint)
//! - classifies each response (success / rate limited / blocked / error)
//! - retries with escalating delay up to a configured bound
//! - recycles the underlying session after a block or every few requests

use crate::config::SearchConfig;
use crate::scraper::RateLimiter;
use crate::{GavelError, Result};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Browser User-Agents rotated across requests
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Pluggable block/challenge heuristic over `(body, final_url)`
///
/// Returns true when the response looks like an interruption page rather
/// than search results. False positives waste a retry; false negatives
/// would corrupt the output, so the default errs toward matching.
pub type BlockPredicate = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Default challenge heuristics: known challenge path, interruption and
/// captcha keywords, or an anomalously short body missing the result
/// markers a real search page always carries.
pub fn default_block_predicate(body: &str, final_url: &str) -> bool {
    if final_url.contains("splashui/challenge") {
        return true;
    }

    let lower = body.to_lowercase();
    if lower.contains("pardon our interruption") || lower.contains("captcha") {
        return true;
    }

    body.len() < 10_000 && !body.contains("s-card") && !body.contains("srp-results")
}

/// Timing and retry knobs for the fetch pipeline
///
/// Defaults are the production pacing values; tests shrink them to keep
/// the suite fast. All durations here are deliberate delays, not incidental
/// latency.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Maximum attempts per fetch before giving up
    pub max_retries: u32,

    /// Request timeout
    pub timeout: Duration,

    /// Requests served by one session before it is recycled
    pub session_requests: u32,

    /// Base pacing delay on steady-state requests
    pub steady_delay: Duration,

    /// Jitter range added to the steady-state delay
    pub steady_jitter: Duration,

    /// Base pacing delay on retries and careful (first-page) requests
    pub careful_delay: Duration,

    /// Extra delay added per retry attempt
    pub retry_step: Duration,

    /// Jitter range added to careful/retry delays
    pub careful_jitter: Duration,

    /// Fixed cooldown after an explicit 429
    pub rate_limit_cooldown: Duration,

    /// Jitter range added to the 429 cooldown
    pub rate_limit_jitter: Duration,

    /// Elevated cooldown after block detection
    pub block_cooldown: Duration,

    /// Jitter range added to the block cooldown
    pub block_jitter: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            timeout: Duration::from_secs(45),
            session_requests: 5,
            steady_delay: Duration::from_secs(2),
            steady_jitter: Duration::from_secs(4),
            careful_delay: Duration::from_secs(5),
            retry_step: Duration::from_secs(3),
            careful_jitter: Duration::from_secs(8),
            rate_limit_cooldown: Duration::from_secs(30),
            rate_limit_jitter: Duration::from_secs(30),
            block_cooldown: Duration::from_secs(15),
            block_jitter: Duration::from_secs(15),
        }
    }
}

/// Adds a uniformly random jitter to a base delay
fn jittered(base: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return base;
    }
    let extra = rand::thread_rng().gen_range(0.0..jitter.as_secs_f64());
    base + Duration::from_secs_f64(extra)
}

/// Fetches search result pages, surviving transient failures and blocks
///
/// Owns the reqwest client (cookie jar included) and the rate limiter.
/// The client is torn down and rebuilt after `session_requests` requests
/// or immediately on block detection, so cookies and connection-level
/// fingerprints never persist long enough to pattern-match.
pub struct PageFetcher {
    policy: FetchPolicy,
    limiter: RateLimiter,
    block_predicate: BlockPredicate,
    client: Option<Client>,
    session_request_count: u32,
}

impl PageFetcher {
    pub fn new(policy: FetchPolicy, limiter: RateLimiter) -> Self {
        Self {
            policy,
            limiter,
            block_predicate: Arc::new(default_block_predicate),
            client: None,
            session_request_count: 0,
        }
    }

    /// Replaces the block heuristic; the pipeline control flow is unchanged
    pub fn with_block_predicate(mut self, predicate: BlockPredicate) -> Self {
        self.block_predicate = predicate;
        self
    }

    /// Builds a fresh session: new cookie jar, new connection pool
    fn build_client(&self) -> std::result::Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(self.policy.timeout)
            .connect_timeout(Duration::from_secs(10))
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()
    }

    /// Gets the current session, recycling it once it has served its quota
    fn client(&mut self) -> Result<Client> {
        if self.client.is_none() || self.session_request_count >= self.policy.session_requests {
            if self.client.is_some() {
                tracing::debug!(
                    "Recycling session after {} requests",
                    self.session_request_count
                );
            }
            self.client = Some(self.build_client()?);
            self.session_request_count = 0;
        }
        Ok(self.client.as_ref().unwrap().clone())
    }

    /// Discards the current session so the next attempt starts fresh
    pub fn reset_session(&mut self) {
        self.client = None;
        self.session_request_count = 0;
    }

    /// Randomized header fingerprint for one request
    fn request_headers(&self, attempt: u32) -> HeaderMap {
        let user_agent = USER_AGENTS[rand::thread_rng().gen_range(0..USER_AGENTS.len())];

        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(user_agent));
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(
            reqwest::header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        );
        headers.insert(reqwest::header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(
            HeaderName::from_static("sec-ch-ua"),
            HeaderValue::from_static(
                "\"Google Chrome\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\"",
            ),
        );
        headers.insert(
            HeaderName::from_static("sec-ch-ua-mobile"),
            HeaderValue::from_static("?0"),
        );
        headers.insert(
            HeaderName::from_static("sec-ch-ua-platform"),
            HeaderValue::from_static(if user_agent.contains("Mac") {
                "\"macOS\""
            } else {
                "\"Windows\""
            }),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-dest"),
            HeaderValue::from_static("document"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-mode"),
            HeaderValue::from_static("navigate"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-site"),
            HeaderValue::from_static("none"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-user"),
            HeaderValue::from_static("?1"),
        );
        headers.insert(
            HeaderName::from_static("upgrade-insecure-requests"),
            HeaderValue::from_static("1"),
        );

        // A bare retry right after a failure looks robotic; arriving from
        // the site root does not
        if attempt > 0 {
            headers.insert(
                reqwest::header::REFERER,
                HeaderValue::from_static("https://www.ebay.com/"),
            );
        }

        headers
    }

    /// Human-pacing delay for one attempt
    ///
    /// Grows with the attempt index; retries and careful (first-page)
    /// requests always pause longer than steady-state ones.
    fn pacing_delay(&self, attempt: u32, careful: bool) -> Duration {
        if attempt > 0 || careful {
            let base = self.policy.careful_delay + self.policy.retry_step * attempt;
            jittered(base, self.policy.careful_jitter)
        } else {
            jittered(self.policy.steady_delay, self.policy.steady_jitter)
        }
    }

    /// Fetches a URL, returning the page body
    ///
    /// Set `careful` on the first page of a multi-page scan to start with
    /// the elevated pacing delay.
    ///
    /// Per attempt: acquire a token, pause, rotate identity, send, then
    /// classify. An explicit 429 sleeps the long cooldown; a response that
    /// matches the block heuristic discards the whole session and sleeps
    /// the elevated cooldown. A classified block page is never returned to
    /// the caller as content. After `max_retries` attempts this fails with
    /// the last recorded error, block detection taking precedence over
    /// transport noise.
    pub async fn fetch(&mut self, url: &str, careful: bool) -> Result<String> {
        let mut last_error: Option<GavelError> = None;
        let mut block_seen = false;

        for attempt in 0..self.policy.max_retries {
            self.limiter.acquire().await;

            let pause = self.pacing_delay(attempt, careful);
            if !pause.is_zero() {
                tracing::debug!("Pacing delay: {:.1}s", pause.as_secs_f64());
                tokio::time::sleep(pause).await;
            }

            let client = self.client()?;
            let headers = self.request_headers(attempt);

            let response = match client.get(url).headers(headers).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Attempt {}: transport error for {}: {}", attempt + 1, url, e);
                    last_error = Some(GavelError::Transport {
                        url: url.to_string(),
                        source: e,
                    });
                    continue;
                }
            };
            self.session_request_count += 1;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!("Rate limited (429) on attempt {}, cooling down", attempt + 1);
                last_error = Some(GavelError::RateLimited {
                    url: url.to_string(),
                });
                let cooldown = jittered(
                    self.policy.rate_limit_cooldown,
                    self.policy.rate_limit_jitter,
                );
                tokio::time::sleep(cooldown).await;
                continue;
            }

            if !status.is_success() {
                tracing::warn!("Attempt {}: HTTP {} for {}", attempt + 1, status.as_u16(), url);
                last_error = Some(GavelError::Http {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
                continue;
            }

            let final_url = response.url().to_string();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!("Attempt {}: failed to read body: {}", attempt + 1, e);
                    last_error = Some(GavelError::Transport {
                        url: url.to_string(),
                        source: e,
                    });
                    continue;
                }
            };

            if (self.block_predicate)(&body, &final_url) {
                tracing::warn!("Challenge page detected on attempt {}", attempt + 1);
                // Fresh cookies and connection on the next attempt
                self.reset_session();
                block_seen = true;
                last_error = Some(GavelError::Blocked {
                    url: final_url.clone(),
                });
                let cooldown = jittered(self.policy.block_cooldown, self.policy.block_jitter);
                tokio::time::sleep(cooldown).await;
                continue;
            }

            return Ok(body);
        }

        if block_seen {
            return Err(GavelError::Blocked {
                url: url.to_string(),
            });
        }
        Err(last_error.unwrap_or(GavelError::RetriesExhausted {
            url: url.to_string(),
        }))
    }
}

/// Builds the search results URL for one page
///
/// Plain GET with a URL-encoded query string: keywords, the sold/completed
/// filters, items per page, sort order, and the page offset (only present
/// past page 1, the way a browser would navigate).
pub fn build_search_url(
    search: &SearchConfig,
    query: &str,
    page: u32,
    items_per_page: u32,
) -> Result<String> {
    let mut url = Url::parse(&search.base_url)?;

    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("_nkw", query)
            .append_pair("_sacat", "0")
            .append_pair("LH_Sold", "1")
            .append_pair("LH_Complete", "1")
            .append_pair("_ipg", &items_per_page.to_string())
            .append_pair("_sop", &search.sort_order.to_string())
            .append_pair("rt", "nc");

        if page > 1 {
            pairs.append_pair("_pgn", &page.to_string());
        }
    }

    Ok(url.to_string())
}
