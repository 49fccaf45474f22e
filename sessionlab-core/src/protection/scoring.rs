//! Continuity and weakness scoring over a short one-minute window.
//!
//! Both scores look mostly at the last three candles ("recent"), with the
//! rest of the window as the baseline for volume, range and the micro-pivot.

use serde::{Deserialize, Serialize};

use crate::config::ProtectionConfig;
use crate::domain::{mean_range, mean_volume, Candle, Direction};

/// Points needed to call momentum confirmed.
pub const CONTINUITY_THRESHOLD: u8 = 6;

/// Points needed to call the move exhausted.
pub const WEAKNESS_THRESHOLD: u8 = 4;

/// Number of trailing candles the per-candle checks look at.
pub const RECENT_CANDLES: usize = 3;

/// Itemised continuity points (max 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContinuityScore {
    pub strong_bodies: u8,
    pub no_opposing_wick: u8,
    pub directional_closes: u8,
    pub displacement: u8,
    pub volume: u8,
}

impl ContinuityScore {
    pub fn total(&self) -> u8 {
        self.strong_bodies
            + self.no_opposing_wick
            + self.directional_closes
            + self.displacement
            + self.volume
    }

    pub fn confirmed(&self) -> bool {
        self.total() >= CONTINUITY_THRESHOLD
    }
}

/// Itemised weakness points (max 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WeaknessScore {
    pub counter_candle: u8,
    pub inside_bar: u8,
    pub opposing_wick: u8,
    pub lateral: u8,
    pub failed_breakout: u8,
    pub no_progress: u8,
}

impl WeaknessScore {
    pub fn total(&self) -> u8 {
        self.counter_candle
            + self.inside_bar
            + self.opposing_wick
            + self.lateral
            + self.failed_breakout
            + self.no_progress
    }

    pub fn confirmed(&self) -> bool {
        self.total() >= WEAKNESS_THRESHOLD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProtectionScores {
    pub continuity: ContinuityScore,
    pub weakness: WeaknessScore,
}

impl ProtectionScores {
    /// Score `candles` (oldest first) for a position moving in `direction`.
    ///
    /// Callers guarantee at least `RECENT_CANDLES + 1` candles.
    pub fn compute(candles: &[Candle], direction: Direction, config: &ProtectionConfig) -> Self {
        let split = candles.len().saturating_sub(RECENT_CANDLES);
        let (earlier, recent) = candles.split_at(split);
        let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
            return Self::default();
        };

        let large_wick = |c: &Candle| {
            let range = c.range();
            range > 0.0 && c.opposing_wick(direction) / range >= config.opposing_wick_ratio
        };
        let strong = |c: &Candle, d: Direction| {
            c.closes_toward(d) && c.body_ratio() >= config.strong_body_ratio
        };

        let strong_aligned = recent.iter().filter(|c| strong(c, direction)).count();
        let any_large_wick = recent.iter().any(large_wick);
        let closes_toward = recent.iter().filter(|c| c.closes_toward(direction)).count();
        let net = direction.sign() * (last.close - first.open);

        let continuity = ContinuityScore {
            strong_bodies: match strong_aligned {
                0 => 0,
                1 => 1,
                _ => 2,
            },
            no_opposing_wick: if any_large_wick { 0 } else { 2 },
            directional_closes: if closes_toward >= 2 { 2 } else { 0 },
            displacement: if net > 0.0 { 2 } else { 0 },
            volume: u8::from(!earlier.is_empty() && mean_volume(recent) >= mean_volume(earlier)),
        };

        let lateral_cutoff = mean_range(candles) * config.lateral_range_ratio;
        let lateral = recent.iter().filter(|c| c.range() < lateral_cutoff).count();
        let inside = recent.len() >= 2 && last.is_inside(&recent[recent.len() - 2]);

        let weakness = WeaknessScore {
            counter_candle: if recent.iter().any(|c| strong(c, direction.opposite())) {
                2
            } else {
                0
            },
            inside_bar: u8::from(inside),
            opposing_wick: u8::from(any_large_wick),
            lateral: u8::from(lateral >= 2),
            failed_breakout: if failed_breakout(earlier, recent, last, direction) {
                2
            } else {
                0
            },
            no_progress: if net <= 0.0 { 2 } else { 0 },
        };

        Self {
            continuity,
            weakness,
        }
    }
}

/// Recent candles pierced the micro-pivot (extreme of the earlier candles in
/// the trade direction) but the last close is back inside it.
fn failed_breakout(earlier: &[Candle], recent: &[Candle], last: &Candle, direction: Direction) -> bool {
    if earlier.is_empty() {
        return false;
    }
    match direction {
        Direction::Bullish => {
            let pivot = earlier.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            recent.iter().any(|c| c.high > pivot) && last.close <= pivot
        }
        Direction::Bearish => {
            let pivot = earlier.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            recent.iter().any(|c| c.low < pivot) && last.close >= pivot
        }
    }
}
