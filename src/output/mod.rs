//! Output module: result persistence and run summaries

mod json;
mod stats;

pub use json::save_to_json;
pub use stats::{price_stats, print_summary, PriceStats};
