//! Coin pair listings

/// Something that can list tradable coin pairs.
pub trait CoinSource {
    /// Pair names such as `BTC/USDT`, in display order.
    fn coins(&self) -> Vec<String>;
}

const DEFAULT_PAIRS: &[&str] = &[
    "BTC/USDT", "ETH/USDT", "BNB/USDT", "SOL/USDT", "XRP/USDT", "ADA/USDT", "DOGE/USDT",
    "TRX/USDT", "DOT/USDT", "MATIC/USDT", "LTC/USDT", "AVAX/USDT", "LINK/USDT", "ATOM/USDT",
    "XLM/USDT", "ETC/USDT", "FIL/USDT", "NEAR/USDT", "APT/USDT", "ARB/USDT", "OP/USDT",
    "ETH/BTC", "BNB/BTC", "SOL/BTC",
];

/// Fixed list of pairs.
#[derive(Debug, Clone)]
pub struct StaticCoinSource {
    pairs: Vec<String>,
}

impl StaticCoinSource {
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pairs: pairs.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for StaticCoinSource {
    fn default() -> Self {
        Self::new(DEFAULT_PAIRS.iter().copied())
    }
}

impl CoinSource for StaticCoinSource {
    fn coins(&self) -> Vec<String> {
        self.pairs.clone()
    }
}

/// Split `BASE/QUOTE` into its halves.
pub fn split_pair(pair: &str) -> Option<(&str, &str)> {
    let (base, quote) = pair.split_once('/')?;
    if base.is_empty() || quote.is_empty() {
        return None;
    }
    Some((base, quote))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_source_lists_btc_first() {
        let coins = StaticCoinSource::default().coins();
        assert_eq!(coins.first().map(String::as_str), Some("BTC/USDT"));
        assert!(coins.iter().all(|c| split_pair(c).is_some()));
    }

    #[test]
    fn test_split_pair() {
        assert_eq!(split_pair("ETH/BTC"), Some(("ETH", "BTC")));
        assert_eq!(split_pair("ETHBTC"), None);
        assert_eq!(split_pair("/BTC"), None);
    }
}
