//! Coin list search and favorites

use regex::Regex;
use std::ops::Range;

use crate::coins::CoinSource;

/// Which list the search runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoinView {
    #[default]
    All,
    Favorites,
}

/// A coin that matched the current query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinMatch {
    pub coin: String,
    /// Byte range covered by the match, empty when there is no query
    pub span: Range<usize>,
    pub favorite: bool,
}

/// Search state for the coin list
#[derive(Debug, Clone, Default)]
pub struct CoinSearch {
    coins: Vec<String>,
    /// Favorites in the order they were added
    favorites: Vec<String>,
    view: CoinView,
    /// Current search pattern (as regex)
    pattern: Option<Regex>,
    /// Search query string
    pub query: String,
}

/// Build a case-insensitive pattern matching `query` as a subsequence.
/// Whitespace in the query is ignored.
fn subsequence_pattern(query: &str) -> Result<Option<Regex>, regex::Error> {
    let parts: Vec<String> = query
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| regex::escape(c.encode_utf8(&mut [0; 4])))
        .collect();
    if parts.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!("(?i){}", parts.join(".*?"))).map(Some)
}

impl CoinSearch {
    pub fn new(coins: Vec<String>) -> Self {
        Self {
            coins,
            ..Self::default()
        }
    }

    pub fn from_source(source: &impl CoinSource) -> Self {
        Self::new(source.coins())
    }

    /// Replace the coin collection. Favorites survive.
    pub fn set_coins(&mut self, coins: Vec<String>) {
        self.coins = coins;
    }

    pub fn coins(&self) -> &[String] {
        &self.coins
    }

    /// Update the search query
    pub fn set_query(&mut self, query: &str) -> Result<(), regex::Error> {
        self.pattern = subsequence_pattern(query)?;
        self.query = query.to_string();
        Ok(())
    }

    /// Clear the query
    pub fn clear(&mut self) {
        self.pattern = None;
        self.query.clear();
    }

    pub fn view(&self) -> CoinView {
        self.view
    }

    pub fn set_view(&mut self, view: CoinView) {
        self.view = view;
    }

    pub fn is_favorite(&self, coin: &str) -> bool {
        self.favorites.iter().any(|f| f == coin)
    }

    /// Flip the favorite status of `coin`. Returns the new status.
    pub fn toggle_favorite(&mut self, coin: &str) -> bool {
        if let Some(index) = self.favorites.iter().position(|f| f == coin) {
            self.favorites.remove(index);
            false
        } else {
            self.favorites.push(coin.to_string());
            true
        }
    }

    pub fn favorites(&self) -> &[String] {
        &self.favorites
    }

    /// Coins in the current view that match the query.
    ///
    /// Without a query the view is returned in order. With one, matches
    /// rank by where the match starts, then by how much of the name it
    /// spans; ties keep list order.
    pub fn results(&self) -> Vec<CoinMatch> {
        let list = match self.view {
            CoinView::All => &self.coins,
            CoinView::Favorites => &self.favorites,
        };

        let Some(ref pattern) = self.pattern else {
            return list
                .iter()
                .map(|coin| CoinMatch {
                    coin: coin.clone(),
                    span: 0..0,
                    favorite: self.is_favorite(coin),
                })
                .collect();
        };

        let mut matches: Vec<CoinMatch> = list
            .iter()
            .filter_map(|coin| {
                let found = pattern.find(coin)?;
                Some(CoinMatch {
                    coin: coin.clone(),
                    span: found.start()..found.end(),
                    favorite: self.is_favorite(coin),
                })
            })
            .collect();
        matches.sort_by_key(|m| (m.span.start, m.span.len()));
        matches
    }
}

/// Windowing for a fixed-row-height scrolling list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualWindow {
    pub item_height: f32,
    pub viewport_height: f32,
}

impl Default for VirtualWindow {
    fn default() -> Self {
        Self {
            item_height: 42.0,
            viewport_height: 369.0,
        }
    }
}

impl VirtualWindow {
    /// Rows visible at `scroll` pixels down a list of `len` rows.
    pub fn visible(&self, scroll: f32, len: usize) -> Range<usize> {
        if self.item_height <= 0.0 {
            return 0..0;
        }
        let start = ((scroll.max(0.0) / self.item_height).floor() as usize).min(len);
        let count = (self.viewport_height / self.item_height).ceil() as usize;
        start..(start + count).min(len)
    }

    /// Offset of the first visible row.
    pub fn offset(&self, start: usize) -> f32 {
        start as f32 * self.item_height
    }

    pub fn total_height(&self, len: usize) -> f32 {
        len as f32 * self.item_height
    }
}
