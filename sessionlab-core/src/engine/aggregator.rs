//! Decision aggregator — runs the entry path for one `(asset, session)`.
//!
//! Order of checks: session window, foundation, sweep, reversal resolver,
//! trend veto and bonus, gap bonus, trade gate. Any missing input yields a
//! `Wait` and a closed session or gate yields `StayOut`; nothing here returns
//! an error to the caller.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use super::decision::{Decision, EntrySetup, StayOutReason, TradeSignal, WaitReason};
use crate::config::{StrategyConfig, TrendConfig};
use crate::context::EvalContext;
use crate::detect::{
    detect_sweep, FoundationManager, GapDetector, Resolution, ReversalResolver,
    TrendValidation, TrendValidator,
};
use crate::domain::{Candle, Session, SessionKey, SessionPhase};
use crate::feed::{normalize, CandleFeed};
use crate::gate::{GateVerdict, TradeGate};
use crate::store::{FoundationStore, StoreError, TradeCountStore};

/// Fewest candles that can hold a foundation, a sweep and a 2CR.
pub const MIN_ENTRY_CANDLES: usize = 4;

pub struct DecisionEngine {
    config: StrategyConfig,
    foundations: FoundationManager,
    gaps: GapDetector,
    resolver: ReversalResolver,
    trend: TrendValidator,
    gate: TradeGate,
    foundation_store: Arc<dyn FoundationStore>,
    trade_counts: Arc<dyn TradeCountStore>,
}

impl DecisionEngine {
    pub fn new(
        config: StrategyConfig,
        foundation_store: Arc<dyn FoundationStore>,
        trade_counts: Arc<dyn TradeCountStore>,
    ) -> Self {
        Self {
            foundations: FoundationManager::new(&config.foundation),
            gaps: GapDetector::new(&config.fvg),
            resolver: ReversalResolver::new(&config.reversal),
            trend: TrendValidator::new(&config.trend),
            gate: TradeGate::new(&config.gate),
            config,
            foundation_store,
            trade_counts,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn gate(&self) -> &TradeGate {
        &self.gate
    }

    /// Fetch candles for `ctx.asset` and evaluate.
    ///
    /// The feed is not called outside the session window.
    pub fn evaluate(
        &self,
        ctx: &EvalContext,
        session: Session,
        now: DateTime<Utc>,
        feed: &dyn CandleFeed,
    ) -> Decision {
        let _span = ctx.span().entered();
        let decision = match self.session_gate(session, now) {
            Some(early) => early,
            None => {
                match feed.candles(&ctx.asset, self.config.timeframe, self.config.candle_limit) {
                    Ok(raw) => self.decide(&ctx.asset, session, now, &normalize(raw)),
                    Err(e) => {
                        warn!(feed = feed.name(), error = %e, "candle fetch failed");
                        Decision::wait(WaitReason::FeedUnavailable(e.to_string()))
                    }
                }
            }
        };
        log_decision(&decision);
        decision
    }

    /// Evaluate over an already-fetched, normalised candle window.
    pub fn evaluate_candles(
        &self,
        ctx: &EvalContext,
        session: Session,
        now: DateTime<Utc>,
        candles: &[Candle],
    ) -> Decision {
        let _span = ctx.span().entered();
        let decision = self
            .session_gate(session, now)
            .unwrap_or_else(|| self.decide(&ctx.asset, session, now, candles));
        log_decision(&decision);
        decision
    }

    /// Count an executed trade against the gate. Called by the order side.
    pub fn record_execution(
        &self,
        asset: &str,
        session: Session,
        date: NaiveDate,
    ) -> Result<u32, StoreError> {
        self.gate
            .record_execution(self.trade_counts.as_ref(), asset, session, date)
    }

    fn session_gate(&self, session: Session, now: DateTime<Utc>) -> Option<Decision> {
        match self.config.sessions.window(session).phase_at(now) {
            SessionPhase::NotStarted => Some(Decision::wait(WaitReason::SessionNotStarted)),
            SessionPhase::Ended => Some(Decision::stay_out(StayOutReason::SessionClosed)),
            SessionPhase::Active => None,
        }
    }

    /// Entry path inside an active session window.
    fn decide(&self, asset: &str, session: Session, now: DateTime<Utc>, candles: &[Candle]) -> Decision {
        let Some(last) = candles.last().filter(|_| candles.len() >= MIN_ENTRY_CANDLES) else {
            return Decision::wait(WaitReason::InsufficientData {
                have: candles.len(),
                need: MIN_ENTRY_CANDLES,
            });
        };

        let date = now.date_naive();
        let key = SessionKey::new(asset, session, date);
        let session_start = self.config.sessions.window(session).start_on(date);
        let foundation = match self.foundations.resolve(
            self.foundation_store.as_ref(),
            &key,
            session_start,
            candles,
        ) {
            Ok(Some(f)) => f,
            Ok(None) => return Decision::wait(WaitReason::FoundationPending),
            Err(e) => {
                warn!(%key, error = %e, "foundation store failed");
                return Decision::wait(WaitReason::StoreUnavailable(e.to_string()));
            }
        };

        let Some(sweep) = detect_sweep(candles, &foundation) else {
            return Decision::wait(WaitReason::NoSweep);
        };
        debug!(side = ?sweep.side, level = sweep.level, at = %sweep.candle.timestamp, "sweep detected");

        let (plan, setup) = match self.resolver.resolve(candles, &sweep) {
            Resolution::DirectEntry { plan, .. } => (plan, EntrySetup::DirectEntry),
            Resolution::Resolved { plan, .. } => (plan, EntrySetup::Resolved),
            Resolution::SeekingConfirmation { .. } => {
                return Decision::wait(WaitReason::SeekingConfirmation)
            }
            Resolution::WaitingInvalidation { opposing, .. } => {
                return Decision::wait(WaitReason::WaitingInvalidation {
                    opposing_level: opposing.level,
                })
            }
            Resolution::Invalidated { .. } => return Decision::wait(WaitReason::Invalidated),
            Resolution::Rejected { reason } => return Decision::wait(WaitReason::Rejected(reason)),
        };

        let trend = self.trend.classify(candles);
        let mut signal = match apply_trend(
            TradeSignal::from_plan(&plan, setup),
            trend,
            &self.config.trend,
        ) {
            Ok(signal) => signal,
            Err(reason) => return Decision::stay_out(reason),
        };

        let direction = signal.side.direction();
        let gaps = self.gaps.detect(candles);
        // Proximity is to where price is now, not to the (possibly older) entry.
        if let Some(gap) = self.gaps.select(&gaps, direction, last.close) {
            signal.confidence += self.config.fvg.confidence_bonus;
            signal.gap = Some(gap);
        }
        signal.confidence = signal.confidence.min(1.0);

        match self
            .gate
            .check(self.trade_counts.as_ref(), asset, session, date)
        {
            Ok(GateVerdict::Open { .. }) => Decision::Enter(signal),
            Ok(GateVerdict::Closed { taken, max }) => {
                Decision::stay_out(StayOutReason::GateClosed { taken, max })
            }
            Err(e) => {
                warn!(error = %e, "trade count store failed");
                Decision::wait(WaitReason::StoreUnavailable(e.to_string()))
            }
        }
    }
}

fn log_decision(decision: &Decision) {
    info!(signal = %decision.signal(), reason = %decision.reason(), "entry decision");
}

/// Veto a signal that runs against a confirmed trend, or add the alignment
/// bonus when it runs with one.
fn apply_trend(
    mut signal: TradeSignal,
    trend: TrendValidation,
    config: &TrendConfig,
) -> Result<TradeSignal, StayOutReason> {
    let direction = signal.side.direction();
    if trend.opposes(direction) && config.reject_counter_trend {
        return Err(StayOutReason::CounterTrend {
            strength_percent: trend.strength_percent,
        });
    }
    if trend.is_trending && trend.direction == direction {
        signal.confidence += config.alignment_bonus;
    }
    signal.trend = Some(trend);
    Ok(signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{EntryPlan, TrendCriteria, VolumeTrend};
    use crate::domain::{Direction, Side};
    use chrono::TimeZone;

    fn signal() -> TradeSignal {
        let plan = EntryPlan {
            side: Side::Sell,
            entry: 102.0,
            stop: 106.5,
            target: 88.5,
            risk_reward: 3.0,
            confidence: 0.70,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 8, 3, 0).unwrap(),
        };
        TradeSignal::from_plan(&plan, EntrySetup::DirectEntry)
    }

    fn trend(is_trending: bool, direction: Direction) -> TrendValidation {
        let all = TrendCriteria {
            directional_closes: true,
            swing_structure: true,
            extension_structure: true,
            volume_confirms: true,
            moving_average_side: true,
        };
        TrendValidation {
            is_trending,
            direction,
            strength_percent: if is_trending { 100 } else { 60 },
            criteria: all,
            volume_trend: VolumeTrend::Increasing,
        }
    }

    #[test]
    fn counter_trend_is_vetoed() {
        let result = apply_trend(signal(), trend(true, Direction::Bullish), &TrendConfig::default());
        assert_eq!(
            result,
            Err(StayOutReason::CounterTrend {
                strength_percent: 100
            })
        );
    }

    #[test]
    fn counter_trend_passes_when_veto_disabled() {
        let config = TrendConfig {
            reject_counter_trend: false,
            ..TrendConfig::default()
        };
        let s = apply_trend(signal(), trend(true, Direction::Bullish), &config).unwrap();
        assert_eq!(s.confidence, 0.70);
    }

    #[test]
    fn aligned_trend_adds_bonus() {
        let s = apply_trend(signal(), trend(true, Direction::Bearish), &TrendConfig::default())
            .unwrap();
        assert!((s.confidence - 0.75).abs() < 1e-12);
        assert!(s.trend.is_some());
    }

    #[test]
    fn non_trending_is_neutral() {
        let s = apply_trend(signal(), trend(false, Direction::Bullish), &TrendConfig::default())
            .unwrap();
        assert_eq!(s.confidence, 0.70);
    }
}
