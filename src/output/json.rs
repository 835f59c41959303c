//! JSON persistence for scrape results

use crate::listing::ScrapeResult;
use crate::Result;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Writes a scrape result to a JSON file
///
/// When `filename` is `None`, one is generated from the query and the
/// run timestamp: `sold_listings_<query_slug>_<YYYYmmdd_HHMMSS>.json`.
/// Parent directories are created as needed.
///
/// # Returns
///
/// The path of the written file.
pub fn save_to_json(
    result: &ScrapeResult,
    output_dir: &Path,
    filename: Option<&str>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let filename = match filename {
        Some(name) => name.to_string(),
        None => {
            let timestamp = result.scraped_at.format("%Y%m%d_%H%M%S");
            let safe_query = result.query.replace(' ', "_").to_lowercase();
            format!("sold_listings_{}_{}.json", safe_query, timestamp)
        }
    };

    let output_path = output_dir.join(filename);
    let file = File::create(&output_path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)?;

    tracing::info!("Saved results to: {}", output_path.display());
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{ListingRecord, StopReason};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_result() -> ScrapeResult {
        let scraped_at = Utc.with_ymd_and_hms(2024, 1, 20, 12, 30, 0).unwrap();
        ScrapeResult::new(
            "one piece tcg OP01".to_string(),
            vec![ListingRecord {
                listing_id: "123".to_string(),
                title: "Booster".to_string(),
                price: 10.0,
                shipping_price: None,
                sold_date: None,
                listing_url: "https://e/123".to_string(),
                scraped_at,
            }],
            1,
            scraped_at,
            StopReason::NoNextPage,
        )
    }

    #[test]
    fn test_save_generates_filename_from_query() {
        let dir = TempDir::new().unwrap();
        let path = save_to_json(&sample_result(), dir.path(), None).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "sold_listings_one_piece_tcg_op01_20240120_123000.json"
        );
        assert!(path.exists());
    }

    #[test]
    fn test_save_respects_explicit_filename() {
        let dir = TempDir::new().unwrap();
        let path = save_to_json(&sample_result(), dir.path(), Some("out.json")).unwrap();

        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "out.json");
    }

    #[test]
    fn test_saved_file_round_trips_expected_shape() {
        let dir = TempDir::new().unwrap();
        let path = save_to_json(&sample_result(), dir.path(), None).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();

        assert_eq!(value["query"], "one piece tcg OP01");
        assert_eq!(value["total_listings"], 1);
        assert_eq!(value["pages_scraped"], 1);
        assert_eq!(value["listings"][0]["listing_id"], "123");
        assert!(value["listings"][0]["shipping_price"].is_null());
    }

    #[test]
    fn test_save_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("data").join("raw");
        let path = save_to_json(&sample_result(), &nested, None).unwrap();

        assert!(path.exists());
    }
}
