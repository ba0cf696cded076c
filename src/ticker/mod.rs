//! Live ticker state: price history, the mock feed and frame scheduling.

pub mod feed;
pub mod frame;
pub mod history;

pub use feed::{spawn_feed, MockPriceFeed, DEFAULT_INTERVAL};
pub use frame::{FrameHandle, FrameScheduler};
pub use history::{PriceHistory, Trend, DEFAULT_HISTORY_LEN};

/// Format a price for the ticker label.
///
/// Prices of at least 1 show two decimals, smaller prices show enough
/// digits to stay readable.
pub fn format_price(price: f64) -> String {
    if price.abs() >= 1.0 {
        format!("{:.2}", price)
    } else if price.abs() >= 0.01 {
        format!("{:.4}", price)
    } else {
        format!("{:.6}", price)
    }
}
