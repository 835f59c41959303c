//! Data model for sold listings and scrape results

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// A single sold listing extracted from a search results page
///
/// Immutable once constructed; records that cannot resolve every required
/// field (id, title, price, URL, sold marker) are never created.
#[derive(Debug, Clone, Serialize)]
pub struct ListingRecord {
    /// Marketplace item id, unique per item
    pub listing_id: String,

    /// Cleaned listing title
    pub title: String,

    /// Sale price; always present and non-negative
    pub price: f64,

    /// Shipping cost: `Some(0.0)` for free shipping, `None` when the page
    /// gave no usable shipping information
    pub shipping_price: Option<f64>,

    /// Parsed sold date; `None` when the date text was unparsable
    pub sold_date: Option<NaiveDateTime>,

    /// Link to the listing page
    pub listing_url: String,

    /// Timestamp of the scrape run; shared by every record from one run
    pub scraped_at: DateTime<Utc>,
}

/// Why a scrape run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source reported no further pages
    NoNextPage,

    /// The configured page limit was reached
    MaxPages,

    /// The configured listing cap was reached
    ListingCap,

    /// A challenge page ended the run early
    Blocked,

    /// The caller cancelled between pages
    Cancelled,
}

/// Aggregate result of one scrape run
///
/// `listings` preserves discovery order across pages and contains each
/// `listing_id` at most once. A run that stopped early (block, cancel) is
/// still a successful partial result; `stop_reason` records why it ended
/// and is not part of the serialized output.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResult {
    pub query: String,
    pub total_listings: usize,
    pub pages_scraped: u32,
    pub scraped_at: DateTime<Utc>,
    pub listings: Vec<ListingRecord>,
    #[serde(skip)]
    pub stop_reason: StopReason,
}

impl ScrapeResult {
    pub fn new(
        query: String,
        listings: Vec<ListingRecord>,
        pages_scraped: u32,
        scraped_at: DateTime<Utc>,
        stop_reason: StopReason,
    ) -> Self {
        Self {
            query,
            total_listings: listings.len(),
            pages_scraped,
            scraped_at,
            listings,
            stop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_record(scraped_at: DateTime<Utc>) -> ListingRecord {
        ListingRecord {
            listing_id: "123456789".to_string(),
            title: "One Piece TCG OP01 Booster Box".to_string(),
            price: 89.99,
            shipping_price: Some(0.0),
            sold_date: NaiveDate::from_ymd_opt(2024, 1, 15)
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap()),
            listing_url: "https://www.ebay.com/itm/123456789".to_string(),
            scraped_at,
        }
    }

    #[test]
    fn test_record_serializes_expected_shape() {
        let scraped_at = Utc::now();
        let record = sample_record(scraped_at);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["listing_id"], "123456789");
        assert_eq!(value["price"], 89.99);
        assert_eq!(value["shipping_price"], 0.0);
        assert_eq!(value["sold_date"], "2024-01-15T00:00:00");
        assert!(value["scraped_at"].is_string());
    }

    #[test]
    fn test_absent_optionals_serialize_as_null() {
        let scraped_at = Utc::now();
        let mut record = sample_record(scraped_at);
        record.shipping_price = None;
        record.sold_date = None;

        let value = serde_json::to_value(&record).unwrap();
        assert!(value["shipping_price"].is_null());
        assert!(value["sold_date"].is_null());
    }

    #[test]
    fn test_result_counts_listings() {
        let scraped_at = Utc::now();
        let listings = vec![sample_record(scraped_at), sample_record(scraped_at)];
        let result = ScrapeResult::new(
            "one piece tcg OP01".to_string(),
            listings,
            1,
            scraped_at,
            StopReason::NoNextPage,
        );

        assert_eq!(result.total_listings, 2);
    }

    #[test]
    fn test_stop_reason_not_serialized() {
        let scraped_at = Utc::now();
        let result = ScrapeResult::new(
            "q".to_string(),
            vec![],
            0,
            scraped_at,
            StopReason::Blocked,
        );

        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("stop_reason").is_none());
        assert_eq!(value["total_listings"], 0);
        assert_eq!(value["pages_scraped"], 0);
    }
}
