//! Trend validation — a strict AND of five criteria.
//!
//! The verdict gets no partial credit: all five criteria must hold. The
//! reported strength does count partial matches (20 points each) so callers
//! can tell a near-miss from noise.

use serde::{Deserialize, Serialize};

use crate::config::TrendConfig;
use crate::domain::{mean_volume, Candle, Direction};
use crate::indicators::{Indicator, Sma};

/// Direction of traded volume across the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeTrend {
    Increasing,
    Flat,
    Decreasing,
}

impl VolumeTrend {
    /// Compare the mean volume of the later half of `candles` against the
    /// earlier half; changes within `flat_band` (relative) are flat.
    pub fn classify(candles: &[Candle], flat_band: f64) -> Self {
        let mid = candles.len() / 2;
        let earlier = mean_volume(&candles[..mid]);
        let later = mean_volume(&candles[mid..]);
        if earlier <= 0.0 {
            return if later > 0.0 { Self::Increasing } else { Self::Flat };
        }
        let change = later / earlier - 1.0;
        if change > flat_band {
            Self::Increasing
        } else if change < -flat_band {
            Self::Decreasing
        } else {
            Self::Flat
        }
    }

    /// Whether this volume trend is compatible with a move in `direction`.
    ///
    /// Rallies need participation; declines may happen on flat volume.
    pub fn supports(self, direction: Direction) -> bool {
        match direction {
            Direction::Bullish => self == Self::Increasing,
            Direction::Bearish => self != Self::Decreasing,
        }
    }
}

/// The five trend criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrendCriteria {
    /// Enough of the most recent candles closed in the direction.
    pub directional_closes: bool,
    /// Higher lows (bullish) or lower highs (bearish).
    pub swing_structure: bool,
    /// Higher highs (bullish) or lower lows (bearish).
    pub extension_structure: bool,
    pub volume_confirms: bool,
    /// Last close on the trend side of the moving average.
    pub moving_average_side: bool,
}

impl TrendCriteria {
    pub fn as_array(&self) -> [bool; 5] {
        [
            self.directional_closes,
            self.swing_structure,
            self.extension_structure,
            self.volume_confirms,
            self.moving_average_side,
        ]
    }

    pub fn satisfied(&self) -> usize {
        self.as_array().iter().filter(|&&b| b).count()
    }

    pub fn all(&self) -> bool {
        self.as_array().iter().all(|&b| b)
    }

    pub fn strength_percent(&self) -> u8 {
        (self.satisfied() * 20) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendValidation {
    pub is_trending: bool,
    pub direction: Direction,
    pub strength_percent: u8,
    pub criteria: TrendCriteria,
    pub volume_trend: VolumeTrend,
}

impl TrendValidation {
    fn from_criteria(direction: Direction, criteria: TrendCriteria, volume_trend: VolumeTrend) -> Self {
        Self {
            is_trending: criteria.all(),
            direction,
            strength_percent: criteria.strength_percent(),
            criteria,
            volume_trend,
        }
    }

    /// True if this is a confirmed trend running against `direction`.
    pub fn opposes(&self, direction: Direction) -> bool {
        self.is_trending && self.direction != direction
    }
}

#[derive(Debug, Clone)]
pub struct TrendValidator {
    config: TrendConfig,
    sma: Sma,
}

impl TrendValidator {
    pub fn new(config: &TrendConfig) -> Self {
        Self {
            config: config.clone(),
            sma: Sma::new(config.sma_period.max(1)),
        }
    }

    /// Validate a trend in `direction` over the last `window` candles.
    pub fn validate(&self, candles: &[Candle], direction: Direction) -> TrendValidation {
        let n = self.config.window.max(self.config.sma_period);
        if candles.len() < n || candles.len() < 2 {
            return TrendValidation::from_criteria(
                direction,
                TrendCriteria::default(),
                VolumeTrend::Flat,
            );
        }
        let sma_window = &candles[candles.len() - n..];
        let window = &candles[candles.len() - self.config.window..];

        let recent_start = window.len().saturating_sub(self.config.recent_candles);
        let closes_in_direction = window[recent_start..]
            .iter()
            .filter(|c| c.closes_toward(direction))
            .count();

        let pairs = (window.len() - 1) as f64;
        let (swing, extension) = window.windows(2).fold((0usize, 0usize), |(s, e), pair| {
            let (prev, cur) = (&pair[0], &pair[1]);
            match direction {
                Direction::Bullish => (
                    s + usize::from(cur.low > prev.low),
                    e + usize::from(cur.high > prev.high),
                ),
                Direction::Bearish => (
                    s + usize::from(cur.high < prev.high),
                    e + usize::from(cur.low < prev.low),
                ),
            }
        });

        let volume_trend = VolumeTrend::classify(window, self.config.volume_flat_band);

        let last_close = window[window.len() - 1].close;
        let ma_side = match self.sma.latest(sma_window) {
            Some(ma) => match direction {
                Direction::Bullish => last_close > ma,
                Direction::Bearish => last_close < ma,
            },
            None => false,
        };

        let criteria = TrendCriteria {
            directional_closes: closes_in_direction >= self.config.min_directional_closes,
            swing_structure: swing as f64 / pairs >= self.config.structure_ratio,
            extension_structure: extension as f64 / pairs >= self.config.structure_ratio,
            volume_confirms: volume_trend.supports(direction),
            moving_average_side: ma_side,
        };
        TrendValidation::from_criteria(direction, criteria, volume_trend)
    }

    /// Evaluate both directions; report the trending one, else the stronger.
    ///
    /// Ties go to the direction of net movement across the window.
    pub fn classify(&self, candles: &[Candle]) -> TrendValidation {
        let bull = self.validate(candles, Direction::Bullish);
        let bear = self.validate(candles, Direction::Bearish);
        if bull.is_trending {
            return bull;
        }
        if bear.is_trending {
            return bear;
        }
        match bull.strength_percent.cmp(&bear.strength_percent) {
            std::cmp::Ordering::Greater => bull,
            std::cmp::Ordering::Less => bear,
            std::cmp::Ordering::Equal => {
                let net = match (candles.first(), candles.last()) {
                    (Some(first), Some(last)) => last.close - first.open,
                    _ => 0.0,
                };
                if net < 0.0 {
                    bear
                } else {
                    bull
                }
            }
        }
    }
}
