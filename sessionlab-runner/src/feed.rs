//! Candle feed implementations for the runner.
//!
//! - [`CsvFeed`] reads `<dir>/<ASSET>_<timeframe>.csv` files
//! - [`SyntheticFeed`] generates a seeded random walk for demos and tests
//! - [`TimeoutFeed`] bounds any feed's latency with a worker thread

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use sessionlab_core::domain::{Candle, Timeframe};
use sessionlab_core::feed::{normalize, CandleFeed, FeedError};
use tracing::{debug, warn};

// ─── CSV ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// RFC 3339 or integer epoch milliseconds.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, FeedError> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| FeedError::Malformed(format!("epoch millis out of range: {raw}")));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| FeedError::Malformed(format!("bad timestamp {raw:?}: {e}")))
}

/// Reads candle files laid out as `<dir>/<ASSET>_<timeframe>.csv` with
/// columns `timestamp,open,high,low,close,volume`.
#[derive(Debug, Clone)]
pub struct CsvFeed {
    dir: PathBuf,
}

impl CsvFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, asset: &str, timeframe: Timeframe) -> PathBuf {
        self.dir.join(format!("{asset}_{}.csv", timeframe.as_str()))
    }

    fn read(path: &Path) -> Result<Vec<Candle>, FeedError> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| FeedError::Unavailable(format!("{}: {e}", path.display())))?;
        reader
            .deserialize::<CsvRow>()
            .map(|row| {
                let row = row.map_err(|e| FeedError::Malformed(e.to_string()))?;
                Ok(Candle {
                    timestamp: parse_timestamp(&row.timestamp)?,
                    open: row.open,
                    high: row.high,
                    low: row.low,
                    close: row.close,
                    volume: row.volume,
                })
            })
            .collect()
    }
}

impl CandleFeed for CsvFeed {
    fn name(&self) -> &str {
        "csv"
    }

    fn candles(&self, asset: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>, FeedError> {
        let path = self.path_for(asset, timeframe);
        if !path.exists() {
            return Err(FeedError::NoData {
                asset: asset.to_string(),
                timeframe,
            });
        }
        let candles = normalize(Self::read(&path)?);
        debug!(path = %path.display(), count = candles.len(), "csv candles loaded");
        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }
}

/// Write candles in the layout [`CsvFeed`] reads.
pub fn write_csv(path: &Path, candles: &[Candle]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for c in candles {
        wtr.write_record(&[
            c.timestamp.to_rfc3339(),
            c.open.to_string(),
            c.high.to_string(),
            c.low.to_string(),
            c.close.to_string(),
            c.volume.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

// ─── Synthetic ───────────────────────────────────────────────────────

/// Random-walk candles ending at a fixed time.
///
/// Deterministic per `(seed, asset, timeframe)`; the same request always
/// returns the same series.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    seed: u64,
    end: DateTime<Utc>,
    start_price: f64,
}

impl SyntheticFeed {
    pub fn new(seed: u64, end: DateTime<Utc>) -> Self {
        Self {
            seed,
            end,
            start_price: 100.0,
        }
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    fn rng_for(&self, asset: &str, timeframe: Timeframe) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(asset.as_bytes());
        hasher.update(timeframe.as_str().as_bytes());
        StdRng::from_seed(*hasher.finalize().as_bytes())
    }
}

impl CandleFeed for SyntheticFeed {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn candles(&self, asset: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>, FeedError> {
        let mut rng = self.rng_for(asset, timeframe);
        let step = timeframe.duration();
        let first = self.end - step * (limit.saturating_sub(1) as i32);
        let mut price = self.start_price;

        Ok((0..limit)
            .map(|i| {
                let ret: f64 = rng.gen_range(-0.004..0.004);
                let open = price;
                let close = price * (1.0 + ret);
                let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.002));
                let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.002));
                price = close;
                Candle {
                    timestamp: first + step * i as i32,
                    open,
                    high,
                    low,
                    close,
                    volume: rng.gen_range(500.0..5_000.0),
                }
            })
            .collect())
    }
}

// ─── Timeout ─────────────────────────────────────────────────────────

/// Runs every fetch on a worker thread and gives up after `timeout`.
///
/// A timed-out worker is left to finish on its own; its result is dropped.
/// At most `max_pending` workers exist at once, so a hung source costs a
/// bounded number of threads: once the limit is reached, fetches fail
/// immediately with `FeedError::Unavailable` until workers drain.
pub struct TimeoutFeed {
    inner: Arc<dyn CandleFeed>,
    timeout: StdDuration,
    max_pending: usize,
    pending: Arc<AtomicUsize>,
    name: String,
}

/// Releases one pending slot when the worker finishes.
struct PendingSlot(Arc<AtomicUsize>);

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TimeoutFeed {
    pub const DEFAULT_MAX_PENDING: usize = 64;

    pub fn new(inner: Arc<dyn CandleFeed>, timeout: StdDuration) -> Self {
        let name = format!("{}+timeout", inner.name());
        Self {
            inner,
            timeout,
            max_pending: Self::DEFAULT_MAX_PENDING,
            pending: Arc::new(AtomicUsize::new(0)),
            name,
        }
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(1);
        self
    }

    /// Workers currently running, including abandoned ones.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn try_reserve(&self) -> Option<PendingSlot> {
        self.pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_pending).then_some(n + 1)
            })
            .ok()
            .map(|_| PendingSlot(Arc::clone(&self.pending)))
    }
}

impl CandleFeed for TimeoutFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn candles(&self, asset: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>, FeedError> {
        let Some(slot) = self.try_reserve() else {
            warn!(feed = self.inner.name(), asset, max = self.max_pending, "too many pending fetches");
            return Err(FeedError::Unavailable(format!(
                "{} has {} fetches still pending",
                self.inner.name(),
                self.max_pending
            )));
        };
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let asset_owned = asset.to_string();
        std::thread::spawn(move || {
            let _slot = slot;
            // The receiver may be gone after a timeout.
            let _ = tx.send(inner.candles(&asset_owned, timeframe, limit));
        });
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let millis = self.timeout.as_millis() as u64;
                warn!(feed = self.inner.name(), asset, millis, "candle fetch timed out");
                Err(FeedError::Timeout { millis })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(FeedError::Unavailable(format!(
                "{} worker exited without a result",
                self.inner.name()
            ))),
        }
    }
}
