//! Listing extraction from search results markup
//!
//! Pure functions of the input text: no network or timing dependency.
//! Any single item whose required fields cannot be resolved is skipped;
//! a malformed item is never fatal to the page.

use crate::listing::ListingRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use scraper::{ElementRef, Html, Selector};

/// Everything extracted from one search results page
#[derive(Debug)]
pub struct PageExtract {
    /// Listings in document order
    pub listings: Vec<ListingRecord>,

    /// Whether the pagination controls point at a further page
    pub has_next_page: bool,

    /// Best-effort total from the results-count caption
    pub total_results: Option<u64>,
}

/// Parses a search results page into listings and page-level metadata
pub fn extract_page(html: &str, scraped_at: DateTime<Utc>) -> PageExtract {
    let document = Html::parse_document(html);

    let mut listings = Vec::new();
    if let Ok(item_selector) = Selector::parse("li.s-card") {
        for item in document.select(&item_selector) {
            if let Some(record) = parse_item(item, scraped_at) {
                listings.push(record);
            }
        }
    }

    PageExtract {
        listings,
        has_next_page: has_next_page(&document),
        total_results: total_results(&document),
    }
}

/// Parses a single listing card; `None` means the item is skipped
fn parse_item(item: ElementRef, scraped_at: DateTime<Utc>) -> Option<ListingRecord> {
    let listing_id = item.value().attr("data-listingid")?.to_string();

    let title_selector = Selector::parse(".s-card__title").ok()?;
    let title_element = item.select(&title_selector).next()?;
    let title = clean_title(&title_element.text().collect::<String>());

    // Empty titles and the storefront placeholder card carry no listing
    if title.is_empty() || title.eq_ignore_ascii_case("shop on ebay") {
        return None;
    }

    let link_selector = Selector::parse("a.s-card__link").ok()?;
    let listing_url = item
        .select(&link_selector)
        .next()?
        .value()
        .attr("href")
        .unwrap_or("")
        .to_string();
    if listing_url.is_empty() {
        return None;
    }

    // Pages mix listing types; only cards with an explicit "Sold" marker
    // belong in the output
    let sold_text = item
        .text()
        .map(str::trim)
        .find(|text| text.starts_with("Sold"))?
        .to_string();
    let sold_date = parse_sold_date(&sold_text);

    let price_selector = Selector::parse(".s-card__price").ok()?;
    let price_text = item
        .select(&price_selector)
        .next()
        .map(|element| element.text().collect::<String>())
        .unwrap_or_default();
    let price = parse_price(&price_text)?;

    let mut shipping_price = None;
    if let Ok(row_selector) = Selector::parse(".s-card__attribute-row") {
        for row in item.select(&row_selector) {
            let row_text = row.text().collect::<String>();
            if find_ascii_ignore_case(&row_text, "delivery").is_some()
                || find_ascii_ignore_case(&row_text, "shipping").is_some()
            {
                shipping_price = parse_shipping(&row_text);
            }
        }
    }

    Some(ListingRecord {
        listing_id,
        title,
        price,
        shipping_price,
        sold_date,
        listing_url,
        scraped_at,
    })
}

/// Case-insensitive (ASCII) substring search
fn find_ascii_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Strips the decorative suffixes and prefixes the source adds to titles
fn clean_title(raw: &str) -> String {
    let mut title = raw;

    // Accessibility boilerplate appended to every link title
    if let Some(idx) = find_ascii_ignore_case(title, "opens in a new window") {
        title = &title[..idx];
    }

    let trimmed = title.trim();
    let without_prefix = if find_ascii_ignore_case(trimmed, "new listing") == Some(0) {
        &trimmed["new listing".len()..]
    } else {
        trimmed
    };

    without_prefix.trim().to_string()
}

/// Parses a price string like "$1,234.56" to a decimal
///
/// Strips everything except digits and the decimal point. Unparsable text
/// yields `None`, never a zero price.
fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|price| *price >= 0.0)
}

/// Parses a shipping cost from text like "+$5.15 delivery" or "Free delivery"
fn parse_shipping(text: &str) -> Option<f64> {
    if find_ascii_ignore_case(text, "free").is_some() {
        return Some(0.0);
    }

    // First numeric token in the text
    let mut token = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() || (!token.is_empty() && c == '.') {
            token.push(c);
        } else if !token.is_empty() {
            break;
        }
    }

    if token.is_empty() {
        None
    } else {
        token.trim_end_matches('.').parse().ok()
    }
}

/// Parses a sold date from text like "Sold  Jan 15, 2024"
///
/// Tries a fixed ordered list of formats; the first match wins. No match
/// yields `None` (not fatal to the item).
fn parse_sold_date(text: &str) -> Option<NaiveDateTime> {
    let mut cleaned = text.trim();
    if find_ascii_ignore_case(cleaned, "sold") == Some(0) {
        cleaned = cleaned["sold".len()..].trim_start();
    }

    const FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y", "%m/%d/%Y", "%d %b %Y"];
    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(cleaned, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Whether the pagination controls indicate a further page
fn has_next_page(document: &Html) -> bool {
    if let Ok(next_selector) =
        Selector::parse("a.pagination__next, a[aria-label*='next'], a[rel='next']")
    {
        if let Some(next_control) = document.select(&next_selector).next() {
            return !next_control.value().classes().any(|class| class == "disabled");
        }
    }

    // No explicit next control; more than one numbered page link also
    // signals further pages
    if let Ok(item_selector) = Selector::parse("a.pagination__item") {
        return document.select(&item_selector).count() > 1;
    }

    false
}

/// Best-effort total result count from the results caption
fn total_results(document: &Html) -> Option<u64> {
    for selector_text in [
        ".srp-controls__count-heading",
        ".srp-controls__count",
        "[class*='result']",
    ] {
        let Ok(selector) = Selector::parse(selector_text) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<String>();
            if let Some(count) = count_from_caption(&text) {
                return Some(count);
            }
        }
    }
    None
}

/// Reads "1,234 results" style captions
fn count_from_caption(text: &str) -> Option<u64> {
    let words: Vec<&str> = text.split_whitespace().collect();
    for pair in words.windows(2) {
        let (number, label) = (pair[0], pair[1]);
        let looks_numeric = number.chars().any(|c| c.is_ascii_digit())
            && number.chars().all(|c| c.is_ascii_digit() || c == ',');
        if looks_numeric {
            let label = label.to_ascii_lowercase();
            if label.starts_with("result") || label.starts_with("item") {
                return number.replace(',', "").parse().ok();
            }
        }
    }
    None
}
