//! Fair value gap (FVG) detection — three-candle imbalances.
//!
//! A bullish gap exists when the third candle's low is above the first
//! candle's high and the middle candle is an aggressive bullish candle; the
//! bearish case mirrors it. Gaps are recomputed from the candle window on
//! every call and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FvgConfig;
use crate::domain::{mean_volume, Candle, Direction};

/// The four boolean quality criteria of a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GapQuality {
    /// Middle candle volume above the window average.
    pub above_average_volume: bool,
    /// No later candle has traded back into the gap.
    pub unmitigated: bool,
    /// Gap size exceeds the minimum fraction of price.
    pub significant_size: bool,
    /// Middle candle body/range above the strong-body ratio.
    pub strong_body: bool,
}

impl GapQuality {
    /// One point per satisfied criterion, in `[0, 4]`.
    pub fn score(&self) -> u8 {
        [
            self.above_average_volume,
            self.unmitigated,
            self.significant_size,
            self.strong_body,
        ]
        .iter()
        .filter(|&&b| b)
        .count() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub direction: Direction,
    pub top: f64,
    pub bottom: f64,
    pub midpoint: f64,
    pub quality: GapQuality,
    /// Timestamp of the middle (impulse) candle.
    pub timestamp: DateTime<Utc>,
}

impl Gap {
    pub fn size(&self) -> f64 {
        self.top - self.bottom
    }

    /// Distance from `price` to the gap midpoint as a fraction of price.
    pub fn distance_fraction(&self, price: f64) -> f64 {
        if price <= 0.0 {
            return f64::INFINITY;
        }
        (self.midpoint - price).abs() / price
    }

    pub fn score(&self) -> u8 {
        self.quality.score()
    }
}

#[derive(Debug, Clone)]
pub struct GapDetector {
    config: FvgConfig,
}

impl GapDetector {
    pub fn new(config: &FvgConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// All gaps in the most recent `window` candles, oldest first.
    pub fn detect(&self, candles: &[Candle]) -> Vec<Gap> {
        let start = candles.len().saturating_sub(self.config.window);
        let window = &candles[start..];
        if window.len() < 3 {
            return Vec::new();
        }
        let avg_volume = mean_volume(window);

        window
            .windows(3)
            .enumerate()
            .filter_map(|(i, triple)| {
                let (c1, c2, c3) = (&triple[0], &triple[1], &triple[2]);
                let impulse = c2.body_ratio() >= self.config.min_impulse_body_ratio;
                let (direction, top, bottom) = if c3.low > c1.high && c2.is_bullish() && impulse {
                    (Direction::Bullish, c3.low, c1.high)
                } else if c3.high < c1.low && c2.is_bearish() && impulse {
                    (Direction::Bearish, c1.low, c3.high)
                } else {
                    return None;
                };

                let later = &window[i + 3..];
                let mitigated = match direction {
                    Direction::Bullish => later.iter().any(|c| c.low <= top),
                    Direction::Bearish => later.iter().any(|c| c.high >= bottom),
                };

                let quality = GapQuality {
                    above_average_volume: c2.volume > avg_volume,
                    unmitigated: !mitigated,
                    significant_size: c2.close > 0.0
                        && (top - bottom) / c2.close > self.config.min_gap_fraction,
                    strong_body: c2.body_ratio() > self.config.strong_body_ratio,
                };

                Some(Gap {
                    direction,
                    top,
                    bottom,
                    midpoint: (top + bottom) / 2.0,
                    quality,
                    timestamp: c2.timestamp,
                })
            })
            .collect()
    }

    /// The nearest gap in `direction` within the distance limit and meeting
    /// the minimum quality.
    pub fn select(&self, gaps: &[Gap], direction: Direction, price: f64) -> Option<Gap> {
        gaps.iter()
            .filter(|g| g.direction == direction)
            .filter(|g| g.score() >= self.config.min_quality)
            .filter(|g| g.distance_fraction(price) <= self.config.max_distance_fraction)
            .min_by(|a, b| {
                a.distance_fraction(price)
                    .total_cmp(&b.distance_fraction(price))
            })
            .copied()
    }
}
