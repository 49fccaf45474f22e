//! End-to-end runner tests: CSV files on disk, a tick, a recorded trade
//! persisted through the state file, and a second tick that must stay out.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sessionlab_core::domain::{Candle, Position, Session, Side, Timeframe};
use sessionlab_core::engine::{Signal, StayOutReason};
use sessionlab_core::feed::CandleFeed;
use sessionlab_core::Decision;
use sessionlab_runner::{
    load_store, save_store, write_csv, CsvFeed, RunnerConfig, TickRunner, TimeoutFeed,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn london_open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap()
}

fn series(step: Duration, rows: &[(f64, f64, f64, f64, f64)]) -> Vec<Candle> {
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, volume))| Candle {
            timestamp: london_open() + step * i as i32,
            open,
            high,
            low,
            close,
            volume,
        })
        .collect()
}

/// Foundation, sweep above, bearish 2CR, decline.
fn entry_series() -> Vec<Candle> {
    series(
        Duration::minutes(5),
        &[
            (100.0, 105.0, 95.0, 101.0, 10.0),
            (104.0, 106.2, 103.8, 106.0, 10.0),
            (106.0, 106.5, 103.5, 104.0, 10.0),
            (104.0, 104.2, 101.8, 102.0, 10.0),
            (102.0, 102.3, 100.8, 101.0, 10.0),
            (101.0, 101.2, 99.8, 100.0, 10.0),
        ],
    )
}

fn config() -> RunnerConfig {
    RunnerConfig {
        assets: vec!["BTCUSDT".into()],
        sessions: vec![Session::London],
        ..RunnerConfig::default()
    }
}

fn feed(dir: &std::path::Path) -> Arc<dyn CandleFeed> {
    Arc::new(TimeoutFeed::new(
        Arc::new(CsvFeed::new(dir)),
        StdDuration::from_secs(5),
    ))
}

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn gate_survives_across_invocations_via_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let csv = CsvFeed::new(dir.path());
    write_csv(&csv.path_for("BTCUSDT", Timeframe::M5), &entry_series()).unwrap();
    let state = dir.path().join("state.json");
    let now = london_open() + Duration::minutes(30);

    // First invocation: signal, then the order side records the fill.
    let store = Arc::new(load_store(&state).unwrap());
    let runner = TickRunner::new(&config(), store.clone(), feed(dir.path()));
    let report = runner.tick(now, 1, &[]);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].decision.signal(), Signal::Sell);
    runner
        .engine()
        .record_execution("BTCUSDT", Session::London, now.date_naive())
        .unwrap();
    save_store(&store, &state).unwrap();

    // Second invocation, fresh process state.
    let store = Arc::new(load_store(&state).unwrap());
    let runner = TickRunner::new(&config(), store, feed(dir.path()));
    let report = runner.tick(now + Duration::minutes(5), 2, &[]);
    assert_eq!(
        report.entries[0].decision,
        Decision::stay_out(StayOutReason::GateClosed { taken: 1, max: 1 })
    );
}

#[test]
fn missing_csv_waits_and_protection_holds() {
    let dir = tempfile::tempdir().unwrap();
    let now = london_open() + Duration::minutes(30);
    let runner = TickRunner::new(
        &config(),
        Arc::new(load_store(&dir.path().join("state.json")).unwrap()),
        feed(dir.path()),
    );
    let mut position = Position::new("BTCUSDT", Side::Buy, 100.0, 98.0, 106.0);
    position.update_mark(102.4);

    let report = runner.tick(now, 1, &[position]);
    assert_eq!(report.entries[0].decision.signal(), Signal::Wait);
    assert_eq!(report.protections.len(), 1);
    assert!(!report.protections[0].decision.should_close());
    assert_eq!(report.closes().count(), 0);
}

#[test]
fn report_serializes_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let csv = CsvFeed::new(dir.path());
    write_csv(&csv.path_for("BTCUSDT", Timeframe::M5), &entry_series()).unwrap();
    let runner = TickRunner::new(
        &config(),
        Arc::new(load_store(&dir.path().join("state.json")).unwrap()),
        feed(dir.path()),
    );
    let report = runner.tick(london_open() + Duration::minutes(30), 1, &[]);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["entries"][0]["decision"]["decision"], "ENTER");
    assert_eq!(json["entries"][0]["decision"]["side"], "SELL");
    assert_eq!(json["config_hash"].as_str().unwrap().len(), 64);
}
