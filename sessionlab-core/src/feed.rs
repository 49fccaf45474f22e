//! Candle feed trait and structured error types.
//!
//! The `CandleFeed` trait abstracts over market-data sources (exchange REST,
//! CSV files, synthetic generators) so the engine can be driven live, replayed
//! or mocked for tests. Feeds may block or fail; the engine treats every
//! failure as insufficient data.

use thiserror::Error;

use crate::domain::{Candle, Timeframe};

/// Structured error types for feed operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("feed timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("feed unavailable: {0}")]
    Unavailable(String),

    #[error("malformed feed response: {0}")]
    Malformed(String),

    #[error("no candles for {asset} {timeframe}")]
    NoData { asset: String, timeframe: Timeframe },
}

/// Source of ordered OHLCV candles per `(asset, timeframe)`.
pub trait CandleFeed: Send + Sync {
    /// Human-readable name of this feed.
    fn name(&self) -> &str;

    /// The most recent `limit` candles, oldest first.
    fn candles(
        &self,
        asset: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, FeedError>;
}

/// Sort by timestamp, drop duplicate timestamps (last write wins) and drop
/// candles that violate the OHLC invariant.
pub fn normalize(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.retain(Candle::is_sane);
    // Stable sort keeps arrival order among equal timestamps.
    candles.sort_by_key(|c| c.timestamp);
    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match out.last_mut() {
            Some(last) if last.timestamp == candle.timestamp => *last = candle,
            _ => out.push(candle),
        }
    }
    out
}

/// In-memory feed over fixed candle sets. Used by tests and replays.
#[derive(Debug, Default, Clone)]
pub struct StaticFeed {
    series: std::collections::HashMap<(String, Timeframe), Vec<Candle>>,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, asset: &str, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        self.insert(asset, timeframe, candles);
        self
    }

    pub fn insert(&mut self, asset: &str, timeframe: Timeframe, candles: Vec<Candle>) {
        self.series
            .insert((asset.to_string(), timeframe), normalize(candles));
    }
}

impl CandleFeed for StaticFeed {
    fn name(&self) -> &str {
        "static"
    }

    fn candles(
        &self,
        asset: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, FeedError> {
        let series = self
            .series
            .get(&(asset.to_string(), timeframe))
            .ok_or_else(|| FeedError::NoData {
                asset: asset.to_string(),
                timeframe,
            })?;
        let start = series.len().saturating_sub(limit);
        Ok(series[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn candle(minute: i64, close: f64) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap() + Duration::minutes(minute),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let candles = vec![candle(2, 102.0), candle(0, 100.0), candle(1, 101.0), candle(1, 111.0)];
        let out = normalize(candles);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].close, 100.0);
        assert_eq!(out[1].close, 111.0, "later duplicate wins");
        assert_eq!(out[2].close, 102.0);
    }

    #[test]
    fn normalize_drops_insane() {
        let mut bad = candle(1, 101.0);
        bad.high = 50.0;
        let out = normalize(vec![candle(0, 100.0), bad]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn static_feed_limits_to_tail() {
        let feed = StaticFeed::new().with_series(
            "BTCUSDT",
            Timeframe::M1,
            (0..10).map(|i| candle(i, 100.0 + i as f64)).collect(),
        );
        let out = feed.candles("BTCUSDT", Timeframe::M1, 3).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].close, 107.0);
    }

    #[test]
    fn static_feed_missing_series() {
        let feed = StaticFeed::new();
        let err = feed.candles("ETHUSDT", Timeframe::M5, 3).unwrap_err();
        assert!(matches!(err, FeedError::NoData { .. }));
    }
}
