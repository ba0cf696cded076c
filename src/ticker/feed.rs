//! Mock live price feed.
//!
//! A seedable random walk stands in for an exchange connection; a tokio
//! interval task pushes each sample into a caller-supplied sink.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default tick interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(300);

/// Prices never walk below this.
const MIN_PRICE: f64 = 0.01;

/// Random walk price source.
#[derive(Debug, Clone)]
pub struct MockPriceFeed {
    price: f64,
    /// Largest relative move per tick
    volatility: f64,
    rng: StdRng,
}

impl MockPriceFeed {
    pub fn new(start: f64, volatility: f64) -> Self {
        Self::with_rng(start, volatility, StdRng::from_os_rng())
    }

    /// Deterministic feed for a given seed.
    pub fn seeded(start: f64, volatility: f64, seed: u64) -> Self {
        Self::with_rng(start, volatility, StdRng::seed_from_u64(seed))
    }

    fn with_rng(start: f64, volatility: f64, rng: StdRng) -> Self {
        Self {
            price: start.max(MIN_PRICE),
            volatility: volatility.abs(),
            rng,
        }
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    /// Advance the walk by one tick.
    pub fn next_sample(&mut self) -> f64 {
        let step: f64 = self.rng.random_range(-1.0..=1.0);
        self.price = (self.price * (1.0 + step * self.volatility)).max(MIN_PRICE);
        self.price
    }
}

/// Push a sample into `sink` every `interval` until the sink returns
/// `false`.
pub fn spawn_feed<F>(mut feed: MockPriceFeed, interval: Duration, mut sink: F) -> JoinHandle<()>
where
    F: FnMut(f64) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if !sink(feed.next_sample()) {
                tracing::debug!("Price feed sink closed");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_feed_is_deterministic() {
        let mut a = MockPriceFeed::seeded(100.0, 0.01, 42);
        let mut b = MockPriceFeed::seeded(100.0, 0.01, 42);
        for _ in 0..20 {
            assert_eq!(a.next_sample(), b.next_sample());
        }
    }

    #[test]
    fn test_feed_moves_within_volatility() {
        let mut feed = MockPriceFeed::seeded(100.0, 0.02, 1);
        let mut last = feed.price();
        for _ in 0..100 {
            let next = feed.next_sample();
            assert!((next / last - 1.0).abs() <= 0.02 + 1e-12);
            last = next;
        }
    }

    #[test]
    fn test_feed_stays_positive() {
        let mut feed = MockPriceFeed::seeded(0.02, 1.0, 9);
        for _ in 0..200 {
            assert!(feed.next_sample() >= MIN_PRICE);
        }
    }

    #[tokio::test]
    async fn test_spawn_feed_stops_when_sink_declines() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut remaining = 3;
        let handle = spawn_feed(
            MockPriceFeed::seeded(100.0, 0.01, 7),
            Duration::from_millis(1),
            move |price| {
                let _ = tx.send(price);
                remaining -= 1;
                remaining > 0
            },
        );
        handle.await.unwrap();

        let mut received = Vec::new();
        while let Ok(price) = rx.try_recv() {
            received.push(price);
        }
        assert_eq!(received.len(), 3);
    }
}
