//! Liquidity sweep detection against a session foundation.
//!
//! A sweep is a candle whose close (not merely its wick) lies beyond the
//! foundation high or low. Only candles after the foundation's anchor are
//! considered, and the most recent sweep wins when both sides were taken.

use serde::{Deserialize, Serialize};

use super::foundation::Foundation;
use crate::domain::{Candle, Direction};

/// Which foundation level was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepSide {
    /// Close above the foundation high (buy-side liquidity taken).
    Above,
    /// Close below the foundation low (sell-side liquidity taken).
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub side: SweepSide,
    pub level: f64,
    pub candle: Candle,
    /// Index of the triggering candle in the slice passed to `detect_sweep`.
    pub index: usize,
}

impl Sweep {
    /// Directional intention implied by the sweep.
    ///
    /// Taking the liquidity above the foundation is treated as the trigger for
    /// a sell-side move, and the mirror for a sweep below.
    pub fn intention(&self) -> Direction {
        match self.side {
            SweepSide::Above => Direction::Bearish,
            SweepSide::Below => Direction::Bullish,
        }
    }
}

/// Most recent candle after the anchor whose close is beyond a foundation level.
pub fn detect_sweep(candles: &[Candle], foundation: &Foundation) -> Option<Sweep> {
    candles
        .iter()
        .enumerate()
        .rev()
        .take_while(|(_, c)| c.timestamp > foundation.anchor_timestamp)
        .find_map(|(index, c)| {
            if c.close > foundation.high {
                Some(Sweep {
                    side: SweepSide::Above,
                    level: foundation.high,
                    candle: *c,
                    index,
                })
            } else if c.close < foundation.low {
                Some(Sweep {
                    side: SweepSide::Below,
                    level: foundation.low,
                    candle: *c,
                    index,
                })
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::foundation::FoundationSource;
    use crate::domain::candle::make_candles;
    use chrono::{DateTime, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap()
    }

    fn foundation() -> Foundation {
        Foundation {
            high: 105.0,
            low: 95.0,
            anchor_timestamp: start(),
            source: FoundationSource::Exact,
        }
    }

    #[test]
    fn wick_only_is_not_a_sweep() {
        let candles = make_candles(
            start(),
            &[
                (100.0, 101.0, 99.0, 100.0, 10.0),
                (100.0, 107.0, 99.0, 104.0, 10.0),
                (100.0, 101.0, 93.0, 96.0, 10.0),
            ],
        );
        assert!(detect_sweep(&candles, &foundation()).is_none());
    }

    #[test]
    fn close_above_is_sweep_above() {
        let candles = make_candles(
            start(),
            &[
                (100.0, 101.0, 99.0, 100.0, 10.0),
                (100.0, 107.0, 99.0, 106.0, 10.0),
                (106.0, 106.5, 103.0, 104.0, 10.0),
            ],
        );
        let sweep = detect_sweep(&candles, &foundation()).unwrap();
        assert_eq!(sweep.side, SweepSide::Above);
        assert_eq!(sweep.level, 105.0);
        assert_eq!(sweep.index, 1);
        assert_eq!(sweep.intention(), Direction::Bearish);
    }

    #[test]
    fn most_recent_side_wins() {
        let candles = make_candles(
            start(),
            &[
                (100.0, 101.0, 99.0, 100.0, 10.0),
                (100.0, 107.0, 99.0, 106.0, 10.0),
                (100.0, 101.0, 93.0, 94.0, 10.0),
                (94.0, 97.0, 93.5, 96.0, 10.0),
            ],
        );
        let sweep = detect_sweep(&candles, &foundation()).unwrap();
        assert_eq!(sweep.side, SweepSide::Below);
        assert_eq!(sweep.index, 2);
        assert_eq!(sweep.intention(), Direction::Bullish);
    }

    #[test]
    fn candles_before_anchor_are_ignored() {
        // The anchor candle itself (index 0) closes above; only later candles count.
        let mut f = foundation();
        f.anchor_timestamp = start() + chrono::Duration::minutes(1);
        let candles = make_candles(
            start(),
            &[
                (100.0, 107.0, 99.0, 106.0, 10.0),
                (100.0, 101.0, 99.0, 100.0, 10.0),
                (100.0, 101.0, 99.0, 100.5, 10.0),
            ],
        );
        assert!(detect_sweep(&candles, &f).is_none());
    }
}
