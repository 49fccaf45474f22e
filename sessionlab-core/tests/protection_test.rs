//! Integration tests for the position protection monitor: zone boundaries,
//! lazy candle fetching, close/hold priority.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use sessionlab_core::config::ProtectionConfig;
use sessionlab_core::domain::{Candle, Position, Side, Timeframe};
use sessionlab_core::feed::{CandleFeed, FeedError};
use sessionlab_core::protection::{ClosureDecision, ProtectionZone, WEAKNESS_THRESHOLD};
use sessionlab_core::{EvalContext, ProtectionMonitor};

// ── Helpers ──────────────────────────────────────────────────────────

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

fn candles(rows: &[(f64, f64, f64, f64, f64)]) -> Vec<Candle> {
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, volume))| Candle {
            timestamp: start() + Duration::minutes(i as i64),
            open,
            high,
            low,
            close,
            volume,
        })
        .collect()
}

/// Feed that counts calls, to prove when no analysis was performed.
struct CountingFeed {
    calls: AtomicUsize,
    candles: Vec<Candle>,
}

impl CountingFeed {
    fn new(candles: Vec<Candle>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            candles,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CandleFeed for CountingFeed {
    fn name(&self) -> &str {
        "counting"
    }

    fn candles(&self, _: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>, FeedError> {
        assert_eq!(timeframe, Timeframe::M1);
        self.calls.fetch_add(1, Ordering::SeqCst);
        let start = self.candles.len().saturating_sub(limit);
        Ok(self.candles[start..].to_vec())
    }
}

/// Long from 100 with stop at 98 (risk 2), marked to give `rr`.
fn long_at_rr(rr: f64) -> Position {
    let mut p = Position::new("BTCUSDT", Side::Buy, 100.0, 98.0, 106.0);
    p.update_mark(100.0 + 2.0 * rr);
    p
}

fn monitor() -> ProtectionMonitor {
    ProtectionMonitor::new(&ProtectionConfig::default())
}

fn ctx() -> EvalContext {
    EvalContext::derive("BTCUSDT", None, start(), 0)
}

/// Rally that stalls, then prints a strong bearish candle.
fn weakening() -> Vec<Candle> {
    candles(&[
        (101.0, 101.6, 100.9, 101.5, 100.0),
        (101.5, 102.1, 101.4, 102.0, 100.0),
        (102.0, 102.6, 101.9, 102.5, 100.0),
        (102.5, 103.1, 102.4, 103.0, 100.0),
        (103.0, 103.2, 102.9, 103.1, 90.0),
        (103.1, 103.15, 101.5, 101.6, 90.0),
        (101.6, 101.9, 100.8, 100.9, 90.0),
    ])
}

/// Steady rally with rising volume.
fn continuing() -> Vec<Candle> {
    candles(&[
        (101.0, 101.6, 100.9, 101.5, 100.0),
        (101.5, 102.1, 101.4, 102.0, 100.0),
        (102.0, 102.6, 101.9, 102.5, 100.0),
        (102.5, 103.1, 102.4, 103.0, 100.0),
        (103.0, 103.6, 102.9, 103.5, 130.0),
        (103.5, 104.1, 103.4, 104.0, 130.0),
        (104.0, 104.6, 103.9, 104.5, 130.0),
    ])
}

/// Choppy window: neither score reaches its threshold.
fn indeterminate() -> Vec<Candle> {
    candles(&[
        (101.0, 101.5, 100.5, 101.2, 100.0),
        (101.2, 101.7, 100.8, 101.0, 100.0),
        (101.0, 101.6, 100.7, 101.4, 100.0),
        (101.4, 101.9, 101.0, 101.2, 100.0),
        (101.2, 101.8, 100.9, 101.5, 100.0),
        (101.5, 102.0, 101.1, 101.3, 100.0),
        (101.3, 101.9, 101.0, 101.6, 100.0),
    ])
}

// ── Zone boundaries ──────────────────────────────────────────────────

#[test]
fn rr_below_floor_holds_without_fetching() {
    let feed = CountingFeed::new(weakening());
    let d = monitor().evaluate(&ctx(), &long_at_rr(0.99), &feed);
    assert!(!d.should_close());
    assert_eq!(feed.calls(), 0);
    assert!(d.scores().is_none());
    assert!(matches!(
        d,
        ClosureDecision::Hold {
            zone: Some(ProtectionZone::Hold),
            ..
        }
    ));
}

#[test]
fn rr_at_let_run_holds_without_fetching() {
    let feed = CountingFeed::new(weakening());
    let d = monitor().evaluate(&ctx(), &long_at_rr(1.50), &feed);
    assert!(!d.should_close());
    assert_eq!(feed.calls(), 0);
    assert!(matches!(
        d,
        ClosureDecision::Hold {
            zone: Some(ProtectionZone::LetRun),
            ..
        }
    ));
}

#[test]
fn weakness_in_protection_zone_closes() {
    let feed = CountingFeed::new(weakening());
    let d = monitor().evaluate(&ctx(), &long_at_rr(1.20), &feed);
    assert_eq!(feed.calls(), 1);
    let scores = d.scores().copied().unwrap();
    assert!(scores.weakness.total() >= WEAKNESS_THRESHOLD);
    assert!(d.should_close());
    assert!((d.current_rr().unwrap() - 1.2).abs() < 1e-9);
}

#[test]
fn continuity_in_protection_zone_holds() {
    let feed = CountingFeed::new(continuing());
    let d = monitor().evaluate(&ctx(), &long_at_rr(1.20), &feed);
    assert_eq!(feed.calls(), 1);
    assert!(!d.should_close());
    assert!(d.scores().unwrap().continuity.confirmed());
    assert!(d.confidence() > 0.5);
}

#[test]
fn indeterminate_closes_by_default() {
    let d = monitor().evaluate_candles(&ctx(), &long_at_rr(1.20), &indeterminate());
    let scores = d.scores().copied().unwrap();
    assert!(!scores.weakness.confirmed());
    assert!(!scores.continuity.confirmed());
    assert!(d.should_close());
    assert_eq!(d.confidence(), 0.5);
}

// ── Robustness ───────────────────────────────────────────────────────

#[test]
fn evaluation_is_idempotent() {
    let feed = CountingFeed::new(weakening());
    let position = long_at_rr(1.20);
    let a = monitor().evaluate(&ctx(), &position, &feed);
    let b = monitor().evaluate(&ctx(), &position, &feed);
    assert_eq!(a, b);
}

#[test]
fn short_position_mirrors() {
    let mut short = Position::new("BTCUSDT", Side::Sell, 100.0, 102.0, 94.0);
    short.update_mark(97.6);
    let falling = candles(&[
        (99.0, 99.1, 98.4, 98.5, 100.0),
        (98.5, 98.6, 97.9, 98.0, 100.0),
        (98.0, 98.1, 97.4, 97.5, 100.0),
        (97.5, 97.6, 96.9, 97.0, 130.0),
        (97.0, 97.1, 96.4, 96.5, 130.0),
        (96.5, 96.6, 95.9, 96.0, 130.0),
    ]);
    let d = monitor().evaluate_candles(&ctx(), &short, &falling);
    assert!((d.current_rr().unwrap() - 1.2).abs() < 1e-9);
    assert!(!d.should_close());
}
