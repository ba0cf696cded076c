//! Bounded price history and trend tracking.

use std::collections::VecDeque;

/// Default number of samples kept.
pub const DEFAULT_HISTORY_LEN: usize = 50;

/// Direction of the last price change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trend {
    #[default]
    Up,
    Down,
}

impl Trend {
    /// Trend from `previous` to `current`; `None` when unchanged.
    pub fn between(previous: f64, current: f64) -> Option<Self> {
        if current > previous {
            Some(Trend::Up)
        } else if current < previous {
            Some(Trend::Down)
        } else {
            None
        }
    }
}

/// The most recent prices, oldest first.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    samples: VecDeque<f64>,
    capacity: usize,
    trend: Trend,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            trend: Trend::default(),
        }
    }

    /// Append a sample, evicting the oldest when full. An unchanged price
    /// keeps the previous trend.
    pub fn push(&mut self, price: f64) {
        if let Some(&last) = self.samples.back() {
            if let Some(trend) = Trend::between(last, price) {
                self.trend = trend;
            }
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(price);
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn previous(&self) -> Option<f64> {
        self.samples.iter().rev().nth(1).copied()
    }

    pub fn trend(&self) -> Trend {
        self.trend
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples as `f32`, oldest first, ready for the plot.
    pub fn series(&self) -> Vec<f32> {
        self.samples.iter().map(|&p| p as f32).collect()
    }
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}
