//! Two-candle reversal (2CR) patterns and the disambiguation resolver.
//!
//! A 2CR is a rejection candle followed by a candle that pushes beyond the
//! rejection candle's extreme in the same direction. After a sweep, the
//! resolver looks for a 2CR matching the sweep's intention, then checks
//! whether the opposite side also printed a 2CR. One-sided confirmation is a
//! direct entry; two-sided confirmation is ambiguous and waits for price to
//! close through the opposing pattern's level.
//!
//! Phases:
//!
//! ```text
//! SeekingConfirmation -> Confirmed -> DirectEntry
//!                                  -> Ambiguous -> WaitingInvalidation -> Resolved
//!                                                                      -> Invalidated
//! ```
//!
//! `Rejected` marks a pattern whose derived entry plan is malformed (zero or
//! inverted risk); it is reported, never raised.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::sweep::Sweep;
use crate::config::{ConfirmationMode, ReversalConfig};
use crate::domain::{Candle, Direction, Side};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoCandleReversal {
    pub candle1: Candle,
    pub candle2: Candle,
    /// Support (bullish) or resistance (bearish) formed by the pattern's extreme.
    pub level: f64,
    pub bias: Direction,
    /// Index of candle2 in the slice the pattern was found in.
    pub index: usize,
}

/// True if `c` rejects prices against `bias`: it closes in the bias
/// direction, or its wick on the rejected side is at least as long as its body.
fn shows_rejection(c: &Candle, bias: Direction) -> bool {
    let rejection_wick = match bias {
        Direction::Bullish => c.lower_wick(),
        Direction::Bearish => c.upper_wick(),
    };
    c.closes_toward(bias) || (rejection_wick > 0.0 && rejection_wick >= c.body())
}

fn confirms(c1: &Candle, c2: &Candle, bias: Direction, mode: ConfirmationMode) -> bool {
    match (bias, mode) {
        (Direction::Bullish, ConfirmationMode::Close) => c2.close > c1.high,
        (Direction::Bullish, ConfirmationMode::Range) => c2.high > c1.high,
        (Direction::Bearish, ConfirmationMode::Close) => c2.close < c1.low,
        (Direction::Bearish, ConfirmationMode::Range) => c2.low < c1.low,
    }
}

/// First 2CR with `bias` whose two candles both lie in `candles[from..to]`.
pub fn find_reversal(
    candles: &[Candle],
    from: usize,
    to: usize,
    bias: Direction,
    mode: ConfirmationMode,
) -> Option<TwoCandleReversal> {
    let to = to.min(candles.len());
    if from + 1 >= to {
        return None;
    }
    (from..to - 1).find_map(|i| {
        let (c1, c2) = (&candles[i], &candles[i + 1]);
        if !shows_rejection(c1, bias) || !confirms(c1, c2, bias, mode) {
            return None;
        }
        let level = match bias {
            Direction::Bullish => c1.low.min(c2.low),
            Direction::Bearish => c1.high.max(c2.high),
        };
        Some(TwoCandleReversal {
            candle1: *c1,
            candle2: *c2,
            level,
            bias,
            index: i + 1,
        })
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolverPhase {
    SeekingConfirmation,
    Confirmed,
    DirectEntry,
    Ambiguous,
    WaitingInvalidation,
    Resolved,
    Invalidated,
    Rejected,
}

/// Entry, stop and target derived from a resolved pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryPlan {
    pub side: Side,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub risk_reward: f64,
    pub confidence: f64,
    /// Close time of the candle the entry is priced from.
    pub timestamp: DateTime<Utc>,
}

impl EntryPlan {
    pub fn risk(&self) -> f64 {
        (self.entry - self.stop).abs()
    }
}

/// Terminal outcome of one resolver run over a candle window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    /// No 2CR matching the intention within the lookahead.
    SeekingConfirmation { intention: Direction },
    DirectEntry {
        confirmed: TwoCandleReversal,
        plan: EntryPlan,
    },
    /// Both sides respected; no close through the opposing level yet.
    WaitingInvalidation {
        confirmed: TwoCandleReversal,
        opposing: TwoCandleReversal,
    },
    Resolved {
        confirmed: TwoCandleReversal,
        opposing: TwoCandleReversal,
        trigger: Candle,
        plan: EntryPlan,
    },
    /// Price closed through the confirmed pattern's own level first.
    Invalidated {
        confirmed: TwoCandleReversal,
        opposing: TwoCandleReversal,
        trigger: Candle,
    },
    Rejected { reason: String },
}

impl Resolution {
    pub fn phase(&self) -> ResolverPhase {
        match self {
            Self::SeekingConfirmation { .. } => ResolverPhase::SeekingConfirmation,
            Self::DirectEntry { .. } => ResolverPhase::DirectEntry,
            Self::WaitingInvalidation { .. } => ResolverPhase::WaitingInvalidation,
            Self::Resolved { .. } => ResolverPhase::Resolved,
            Self::Invalidated { .. } => ResolverPhase::Invalidated,
            Self::Rejected { .. } => ResolverPhase::Rejected,
        }
    }

    pub fn plan(&self) -> Option<&EntryPlan> {
        match self {
            Self::DirectEntry { plan, .. } | Self::Resolved { plan, .. } => Some(plan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReversalResolver {
    config: ReversalConfig,
}

impl ReversalResolver {
    pub fn new(config: &ReversalConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Run the resolver over `candles`, starting after `sweep`.
    ///
    /// `sweep.index` must index into `candles`.
    pub fn resolve(&self, candles: &[Candle], sweep: &Sweep) -> Resolution {
        let intention = sweep.intention();
        let mode = self.config.confirmation;
        let lookahead = self.config.lookahead;

        let seek_from = sweep.index + 1;
        let Some(confirmed) =
            find_reversal(candles, seek_from, seek_from + lookahead, intention, mode)
        else {
            debug!(?intention, "no confirming 2CR yet");
            return Resolution::SeekingConfirmation { intention };
        };
        debug!(
            phase = ?ResolverPhase::Confirmed,
            level = confirmed.level,
            at = %confirmed.candle2.timestamp,
            "confirming 2CR found"
        );

        let opp_from = confirmed.index + 1;
        let opposing = find_reversal(
            candles,
            opp_from,
            opp_from + lookahead,
            intention.opposite(),
            mode,
        );

        let Some(opposing) = opposing else {
            debug!(phase = ?ResolverPhase::DirectEntry, "no opposing 2CR");
            return match self.plan(
                intention,
                confirmed.candle2.close,
                confirmed.level,
                self.config.direct_confidence,
                confirmed.candle2.timestamp,
            ) {
                Ok(plan) => Resolution::DirectEntry { confirmed, plan },
                Err(reason) => reject(reason),
            };
        };

        debug!(
            phase = ?ResolverPhase::Ambiguous,
            opposing_level = opposing.level,
            "both sides respected, waiting for invalidation"
        );

        for trigger in &candles[opposing.index + 1..] {
            if closes_beyond(trigger, opposing.level, intention) {
                let buffer = opposing.level * self.config.invalidation_buffer;
                let stop = opposing.level - intention.sign() * buffer;
                debug!(phase = ?ResolverPhase::Resolved, at = %trigger.timestamp, "opposing level broken");
                return match self.plan(
                    intention,
                    trigger.close,
                    stop,
                    self.config.resolved_confidence,
                    trigger.timestamp,
                ) {
                    Ok(plan) => Resolution::Resolved {
                        confirmed,
                        opposing,
                        trigger: *trigger,
                        plan,
                    },
                    Err(reason) => reject(reason),
                };
            }
            if closes_beyond(trigger, confirmed.level, intention.opposite()) {
                debug!(phase = ?ResolverPhase::Invalidated, at = %trigger.timestamp, "confirmed level broken");
                return Resolution::Invalidated {
                    confirmed,
                    opposing,
                    trigger: *trigger,
                };
            }
        }

        Resolution::WaitingInvalidation {
            confirmed,
            opposing,
        }
    }

    /// Fixed reward:risk plan; errors when the risk is not strictly positive.
    fn plan(
        &self,
        direction: Direction,
        entry: f64,
        stop: f64,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<EntryPlan, String> {
        let risk = direction.sign() * (entry - stop);
        if !risk.is_finite() || risk <= 0.0 {
            return Err(format!(
                "{direction} plan has non-positive risk (entry {entry}, stop {stop})"
            ));
        }
        let rr = self.config.risk_reward;
        Ok(EntryPlan {
            side: direction.side(),
            entry,
            stop,
            target: entry + direction.sign() * rr * risk,
            risk_reward: rr,
            confidence,
            timestamp,
        })
    }
}

/// True if `c` closed beyond `level` in `direction`.
fn closes_beyond(c: &Candle, level: f64, direction: Direction) -> bool {
    match direction {
        Direction::Bullish => c.close > level,
        Direction::Bearish => c.close < level,
    }
}

fn reject(reason: String) -> Resolution {
    warn!(phase = ?ResolverPhase::Rejected, %reason, "malformed 2CR plan");
    Resolution::Rejected { reason }
}
