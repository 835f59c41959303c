//! Official Finding API client
//!
//! Alternate acquisition path over the marketplace's paginated search API:
//! a plain authenticated request-response wrapper with none of the
//! anti-detection concerns of the HTML pipeline. Credentials are explicit
//! constructor parameters; nothing here reads the process environment.

use crate::listing::ListingRecord;
use crate::{GavelError, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::time::Duration;

const FINDING_API_URL: &str = "https://svcs.ebay.com/services/search/FindingService/v1";
const OAUTH_URL: &str = "https://api.ebay.com/identity/v1/oauth2/token";

/// Client for the Finding API's completed/sold item search
pub struct FindingApiClient {
    client: Client,
    client_id: String,
    client_secret: String,
    finding_url: String,
    oauth_url: String,
    access_token: Option<String>,
}

impl FindingApiClient {
    /// Creates a client against the production endpoints
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        Self::with_endpoints(
            client_id,
            client_secret,
            FINDING_API_URL.to_string(),
            OAUTH_URL.to_string(),
        )
    }

    /// Creates a client against explicit endpoints (used by tests)
    pub fn with_endpoints(
        client_id: String,
        client_secret: String,
        finding_url: String,
        oauth_url: String,
    ) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            client_id,
            client_secret,
            finding_url,
            oauth_url,
            access_token: None,
        })
    }

    /// Obtains (and caches) an OAuth token via the client-credentials flow
    ///
    /// The Finding search endpoint itself authenticates with the app id
    /// header; the token is needed for the other API families.
    pub async fn access_token(&mut self) -> Result<String> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }

        let response = self
            .client
            .post(&self.oauth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", "https://api.ebay.com/oauth/api_scope"),
            ])
            .send()
            .await
            .map_err(|e| GavelError::Transport {
                url: self.oauth_url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GavelError::Http {
                url: self.oauth_url.clone(),
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let token = body["access_token"]
            .as_str()
            .ok_or_else(|| GavelError::Api("missing access_token in OAuth response".to_string()))?
            .to_string();

        tracing::info!("Obtained OAuth token");
        self.access_token = Some(token.clone());
        Ok(token)
    }

    /// Searches completed/sold items, one page at a time
    ///
    /// Returns the page's records and the total page count reported by the
    /// API. `per_page` is capped at 100 by the service.
    pub async fn search_sold_items(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<ListingRecord>, u32)> {
        let request_body = build_finding_request(query, page, per_page);

        let response = self
            .client
            .post(&self.finding_url)
            .header("X-EBAY-SOA-SECURITY-APPNAME", &self.client_id)
            .header("X-EBAY-SOA-OPERATION-NAME", "findCompletedItems")
            .header("X-EBAY-SOA-SERVICE-VERSION", "1.13.0")
            .header("X-EBAY-SOA-RESPONSE-DATA-FORMAT", "XML")
            .header("X-EBAY-SOA-GLOBAL-ID", "EBAY-US")
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(request_body)
            .send()
            .await
            .map_err(|e| GavelError::Transport {
                url: self.finding_url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GavelError::Http {
                url: self.finding_url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| GavelError::Transport {
            url: self.finding_url.clone(),
            source: e,
        })?;

        parse_finding_response(&body, Utc::now())
    }

    /// Paginates through all sold items for a query
    pub async fn search_all_sold_items(
        &self,
        query: &str,
        max_pages: u32,
    ) -> Result<Vec<ListingRecord>> {
        let mut all_items = Vec::new();

        for page in 1..=max_pages {
            let (items, total_pages) = self.search_sold_items(query, page, 100).await?;
            tracing::info!(
                "Page {}/{}: got {} items (total: {})",
                page,
                total_pages,
                items.len(),
                all_items.len() + items.len()
            );
            all_items.extend(items);

            if page >= total_pages {
                break;
            }
        }

        Ok(all_items)
    }
}

/// Builds the findCompletedItems XML request body
fn build_finding_request(query: &str, page: u32, per_page: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<findCompletedItemsRequest xmlns="http://www.ebay.com/marketplace/search/v1/services">
    <keywords>{}</keywords>
    <itemFilter>
        <name>SoldItemsOnly</name>
        <value>true</value>
    </itemFilter>
    <sortOrder>EndTimeSoonest</sortOrder>
    <paginationInput>
        <entriesPerPage>{}</entriesPerPage>
        <pageNumber>{}</pageNumber>
    </paginationInput>
</findCompletedItemsRequest>"#,
        escape_xml(query),
        per_page.min(100),
        page
    )
}

/// Minimal XML text escaping for the request body
fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[derive(Default)]
struct PartialItem {
    item_id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    price: Option<f64>,
    shipping: Option<f64>,
    end_time: Option<DateTime<Utc>>,
}

impl PartialItem {
    fn into_record(self, scraped_at: DateTime<Utc>) -> Option<ListingRecord> {
        Some(ListingRecord {
            listing_id: self.item_id?,
            title: self.title?,
            price: self.price.unwrap_or(0.0),
            shipping_price: self.shipping,
            sold_date: self.end_time.map(|dt| dt.naive_utc()),
            listing_url: self.url.unwrap_or_default(),
            scraped_at,
        })
    }
}

/// Parses a findCompletedItems XML response
///
/// Surfaces the API's own error message when the acknowledgment is not
/// Success; individual items that fail to parse are skipped.
fn parse_finding_response(
    xml: &str,
    scraped_at: DateTime<Utc>,
) -> Result<(Vec<ListingRecord>, u32)> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut items = Vec::new();
    let mut total_pages = 0u32;
    let mut ack: Option<String> = None;
    let mut error_message: Option<String> = None;

    let mut current: Option<PartialItem> = None;
    let mut tag_stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                if name == "item" {
                    current = Some(PartialItem::default());
                }
                tag_stack.push(name);
            }
            Event::End(end) => {
                if end.local_name().as_ref() == b"item" {
                    if let Some(record) = current.take().and_then(|p| p.into_record(scraped_at)) {
                        items.push(record);
                    }
                }
                tag_stack.pop();
            }
            Event::Text(text) => {
                let value = text.unescape()?.into_owned();
                let tag = tag_stack.last().map(String::as_str);

                if let Some(item) = current.as_mut() {
                    match tag {
                        Some("itemId") => item.item_id = Some(value),
                        Some("title") => item.title = Some(value),
                        Some("viewItemURL") => item.url = Some(value),
                        Some("currentPrice") => item.price = value.parse().ok(),
                        Some("shippingServiceCost") => item.shipping = value.parse().ok(),
                        Some("endTime") => {
                            item.end_time = DateTime::parse_from_rfc3339(&value)
                                .ok()
                                .map(|dt| dt.with_timezone(&Utc));
                        }
                        _ => {}
                    }
                } else {
                    match tag {
                        Some("ack") => ack = Some(value),
                        Some("totalPages") => total_pages = value.parse().unwrap_or(0),
                        Some("message") => error_message = Some(value),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(ack) = ack {
        if ack != "Success" {
            let message = error_message.unwrap_or_else(|| "Unknown error".to_string());
            return Err(GavelError::Api(message));
        }
    }

    tracing::debug!("Parsed {} items, total pages: {}", items.len(), total_pages);
    Ok((items, total_pages))
}
