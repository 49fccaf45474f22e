//! Tick orchestration — one polling pass over every configured pair and
//! every open position.
//!
//! Each `(asset, session)` evaluation and each protection check runs as its
//! own rayon task. They share only the engine (immutable) and the store,
//! whose operations are atomic per key.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sessionlab_core::domain::{Position, Session};
use sessionlab_core::engine::Signal;
use sessionlab_core::feed::CandleFeed;
use sessionlab_core::store::InMemoryStore;
use sessionlab_core::{ClosureDecision, Decision, DecisionEngine, EvalContext, ProtectionMonitor};
use tracing::info;

use crate::config::{FeedSource, RunnerConfig};
use crate::feed::{CsvFeed, SyntheticFeed, TimeoutFeed};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryReport {
    pub asset: String,
    pub session: Session,
    pub correlation_id: String,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionReport {
    pub asset: String,
    pub correlation_id: String,
    pub decision: ClosureDecision,
}

/// Everything one tick decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    pub sequence: u64,
    pub config_hash: String,
    pub entries: Vec<EntryReport>,
    pub protections: Vec<ProtectionReport>,
}

impl TickReport {
    /// Entries that produced a BUY or SELL.
    pub fn signals(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries
            .iter()
            .filter(|e| matches!(e.decision.signal(), Signal::Buy | Signal::Sell))
    }

    pub fn closes(&self) -> impl Iterator<Item = &ProtectionReport> {
        self.protections.iter().filter(|p| p.decision.should_close())
    }
}

/// Feed for `config`, wrapped in the configured timeout.
pub fn build_feed(config: &RunnerConfig, now: DateTime<Utc>) -> Arc<dyn CandleFeed> {
    let inner: Arc<dyn CandleFeed> = match config.feed.source {
        FeedSource::Csv => Arc::new(CsvFeed::new(&config.feed.data_dir)),
        FeedSource::Synthetic => Arc::new(SyntheticFeed::new(config.feed.seed, now)),
    };
    Arc::new(
        TimeoutFeed::new(inner, StdDuration::from_millis(config.feed.timeout_ms))
            .with_max_pending(config.feed.max_pending_fetches),
    )
}

pub struct TickRunner {
    engine: DecisionEngine,
    monitor: ProtectionMonitor,
    feed: Arc<dyn CandleFeed>,
    pairs: Vec<(String, Session)>,
    config_hash: String,
}

impl TickRunner {
    pub fn new(config: &RunnerConfig, store: Arc<InMemoryStore>, feed: Arc<dyn CandleFeed>) -> Self {
        let pairs = config
            .assets
            .iter()
            .flat_map(|a| config.sessions.iter().map(move |s| (a.clone(), *s)))
            .collect();
        Self {
            engine: DecisionEngine::new(config.strategy.clone(), store.clone(), store),
            monitor: ProtectionMonitor::new(&config.strategy.protection),
            feed,
            pairs,
            config_hash: config.strategy.fingerprint().to_string(),
        }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Evaluate every pair and every position at `now`.
    ///
    /// `sequence` distinguishes ticks that share a timestamp in correlation ids.
    pub fn tick(&self, now: DateTime<Utc>, sequence: u64, positions: &[Position]) -> TickReport {
        let report = TickReport {
            at: now,
            sequence,
            config_hash: self.config_hash.clone(),
            entries: self.evaluate_entries(now, sequence),
            protections: self.check_positions(now, sequence, positions),
        };
        info!(
            %now,
            sequence,
            signals = report.signals().count(),
            closes = report.closes().count(),
            "tick complete"
        );
        report
    }

    /// Entry decisions for every configured `(asset, session)` pair.
    pub fn evaluate_entries(&self, now: DateTime<Utc>, sequence: u64) -> Vec<EntryReport> {
        let feed = self.feed.as_ref();
        self.pairs
            .par_iter()
            .map(|(asset, session)| {
                let ctx = EvalContext::derive(asset, Some(*session), now, sequence);
                let decision = self.engine.evaluate(&ctx, *session, now, feed);
                EntryReport {
                    asset: asset.clone(),
                    session: *session,
                    correlation_id: ctx.correlation_id.to_string(),
                    decision,
                }
            })
            .collect()
    }

    /// Closure decisions for `positions`. Entry pairs are not evaluated.
    pub fn check_positions(
        &self,
        now: DateTime<Utc>,
        sequence: u64,
        positions: &[Position],
    ) -> Vec<ProtectionReport> {
        let feed = self.feed.as_ref();
        positions
            .par_iter()
            .map(|position| {
                let ctx = EvalContext::derive(&position.asset, None, now, sequence);
                let decision = self.monitor.evaluate(&ctx, position, feed);
                ProtectionReport {
                    asset: position.asset.clone(),
                    correlation_id: ctx.correlation_id.to_string(),
                    decision,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sessionlab_core::domain::Side;

    #[test]
    fn evaluates_every_pair_and_position() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let config = RunnerConfig {
            assets: vec!["BTCUSDT".into(), "ETHUSDT".into()],
            ..RunnerConfig::default()
        };
        let feed: Arc<dyn CandleFeed> = Arc::new(SyntheticFeed::new(5, now));
        let runner = TickRunner::new(&config, Arc::new(InMemoryStore::new()), feed);
        let positions = vec![Position::new("BTCUSDT", Side::Buy, 100.0, 98.0, 106.0)];

        let report = runner.tick(now, 1, &positions);
        assert_eq!(report.entries.len(), 6);
        assert_eq!(report.protections.len(), 1);
        // Asia has ended by 09:00, so it is never a signal.
        assert!(report
            .entries
            .iter()
            .filter(|e| e.session == Session::Asia)
            .all(|e| e.decision.signal() == Signal::StayOut));
    }

    #[test]
    fn same_tick_is_reproducible() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let config = RunnerConfig::default();
        let feed: Arc<dyn CandleFeed> = Arc::new(SyntheticFeed::new(5, now));
        let a = TickRunner::new(&config, Arc::new(InMemoryStore::new()), feed.clone()).tick(now, 1, &[]);
        let b = TickRunner::new(&config, Arc::new(InMemoryStore::new()), feed).tick(now, 1, &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn check_positions_skips_entry_pairs() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let feed: Arc<dyn CandleFeed> = Arc::new(SyntheticFeed::new(5, now));
        let runner = TickRunner::new(&RunnerConfig::default(), Arc::new(InMemoryStore::new()), feed);
        let mut position = Position::new("BTCUSDT", Side::Sell, 100.0, 102.0, 94.0);
        position.update_mark(97.0);

        let reports = runner.check_positions(now, 1, &[position]);
        assert_eq!(reports.len(), 1);
        // RR 1.5 is in the let-run zone.
        assert!(!reports[0].decision.should_close());
    }
}
