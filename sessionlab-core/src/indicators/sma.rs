//! Simple Moving Average (SMA).
//!
//! Rolling mean of close prices over a lookback window.
//! Lookback: period - 1 (first valid value at index period-1).

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];
        let mut sum = 0.0;
        // NaN closes are counted rather than summed so the window recovers
        // once they roll out.
        let mut nan_in_window = 0usize;

        for i in 0..n {
            let entering = candles[i].close;
            if entering.is_nan() {
                nan_in_window += 1;
            } else {
                sum += entering;
            }
            if i >= self.period {
                let leaving = candles[i - self.period].close;
                if leaving.is_nan() {
                    nan_in_window -= 1;
                } else {
                    sum -= leaving;
                }
            }
            if i + 1 >= self.period && nan_in_window == 0 {
                result[i] = sum / self.period as f64;
            }
        }
        result
    }
}
