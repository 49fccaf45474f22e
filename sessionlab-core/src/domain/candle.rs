//! Candle — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Direction;

/// OHLCV candle for a single asset at a single timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Returns true if any OHLCV field is NaN (void candle).
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// `low <= min(open, close) <= max(open, close) <= high`, positive prices.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
            && self.volume >= 0.0
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// True if the candle closed in `direction`.
    pub fn closes_toward(&self, direction: Direction) -> bool {
        match direction {
            Direction::Bullish => self.is_bullish(),
            Direction::Bearish => self.is_bearish(),
        }
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Body as a fraction of the full range. Zero-range candles report 0.
    pub fn body_ratio(&self) -> f64 {
        let range = self.range();
        if range <= 0.0 {
            0.0
        } else {
            self.body() / range
        }
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    /// Wick pointing against `direction` (upper wick for bullish, lower for bearish).
    pub fn opposing_wick(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Bullish => self.upper_wick(),
            Direction::Bearish => self.lower_wick(),
        }
    }

    /// True if this candle's range sits inside `prev`'s range.
    pub fn is_inside(&self, prev: &Candle) -> bool {
        self.high <= prev.high && self.low >= prev.low
    }
}

/// Mean volume over a slice. Empty slices report 0.
pub fn mean_volume(candles: &[Candle]) -> f64 {
    if candles.is_empty() {
        return 0.0;
    }
    candles.iter().map(|c| c.volume).sum::<f64>() / candles.len() as f64
}

/// Mean high-low range over a slice. Empty slices report 0.
pub fn mean_range(candles: &[Candle]) -> f64 {
    if candles.is_empty() {
        return 0.0;
    }
    candles.iter().map(Candle::range).sum::<f64>() / candles.len() as f64
}

/// Build a candle sequence for tests: one candle per minute starting at `start`.
#[cfg(test)]
pub fn make_candles(start: DateTime<Utc>, ohlcv: &[(f64, f64, f64, f64, f64)]) -> Vec<Candle> {
    ohlcv
        .iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, volume))| Candle {
            timestamp: start + chrono::Duration::minutes(i as i64),
            open,
            high,
            low,
            close,
            volume,
        })
        .collect()
}
