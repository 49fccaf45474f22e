//! Indicators over candle series.
//!
//! Indicators are pure functions: candle history in, numeric series out.
//! Output has the same length as the input; the first `lookback()` values
//! are `f64::NAN` (warmup).
//!
//! # Look-ahead guard
//! No indicator value at candle t may depend on candle t+1 or later.

pub mod sma;

pub use sma::Sma;

use crate::domain::Candle;

pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_10").
    fn name(&self) -> &str;

    /// Number of candles needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire candle series.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;

    /// Value at the last candle, if warmed up.
    fn latest(&self, candles: &[Candle]) -> Option<f64> {
        self.compute(candles).last().copied().filter(|v| !v.is_nan())
    }
}

/// Create synthetic one-minute candles from close prices for testing.
///
/// open = prev_close (or close for the first candle),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_closes(closes: &[f64]) -> Vec<Candle> {
    use chrono::TimeZone;
    let start = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: start + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
