//! Decision types produced by the entry path.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::{EntryPlan, Gap, TrendValidation};
use crate::domain::Side;

/// How the entry was reached in the reversal resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntrySetup {
    /// One-sided 2CR confirmation.
    DirectEntry,
    /// Two-sided confirmation resolved by a close through the opposing level.
    Resolved,
}

/// An actionable entry, handed to the order-placement collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub side: Side,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub risk_reward: f64,
    pub confidence: f64,
    pub setup: EntrySetup,
    /// Supporting gap in the signal's direction, if one qualified.
    pub gap: Option<Gap>,
    pub trend: Option<TrendValidation>,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

impl TradeSignal {
    pub(crate) fn from_plan(plan: &EntryPlan, setup: EntrySetup) -> Self {
        let reason = match setup {
            EntrySetup::DirectEntry => format!(
                "2CR confirmed after sweep, no opposing pattern: {} at {:.5}",
                plan.side, plan.entry
            ),
            EntrySetup::Resolved => format!(
                "opposing 2CR invalidated by close: {} at {:.5}",
                plan.side, plan.entry
            ),
        };
        Self {
            side: plan.side,
            entry: plan.entry,
            stop: plan.stop,
            target: plan.target,
            risk_reward: plan.risk_reward,
            confidence: plan.confidence,
            setup,
            gap: None,
            trend: None,
            timestamp: plan.timestamp,
            reason,
        }
    }
}

/// Why the engine declines to trade for the rest of the current condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StayOutReason {
    SessionClosed,
    GateClosed { taken: u32, max: u32 },
    CounterTrend { strength_percent: u8 },
}

impl fmt::Display for StayOutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionClosed => write!(f, "session has ended"),
            Self::GateClosed { taken, max } => {
                write!(f, "trade limit reached for session ({taken}/{max})")
            }
            Self::CounterTrend { strength_percent } => {
                write!(f, "signal runs against a confirmed trend ({strength_percent}%)")
            }
        }
    }
}

/// Why the engine has nothing to do yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum WaitReason {
    SessionNotStarted,
    FeedUnavailable(String),
    StoreUnavailable(String),
    InsufficientData { have: usize, need: usize },
    FoundationPending,
    NoSweep,
    SeekingConfirmation,
    WaitingInvalidation { opposing_level: f64 },
    Invalidated,
    Rejected(String),
}

impl fmt::Display for WaitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotStarted => write!(f, "session has not started"),
            Self::FeedUnavailable(e) => write!(f, "candle feed unavailable: {e}"),
            Self::StoreUnavailable(e) => write!(f, "state store unavailable: {e}"),
            Self::InsufficientData { have, need } => {
                write!(f, "insufficient candles ({have} of {need})")
            }
            Self::FoundationPending => write!(f, "session foundation not yet available"),
            Self::NoSweep => write!(f, "no liquidity sweep of the foundation"),
            Self::SeekingConfirmation => write!(f, "sweep seen, waiting for a confirming 2CR"),
            Self::WaitingInvalidation { opposing_level } => {
                write!(f, "both sides respected, waiting for close through {opposing_level:.5}")
            }
            Self::Invalidated => write!(f, "confirmed pattern invalidated"),
            Self::Rejected(reason) => write!(f, "malformed pattern: {reason}"),
        }
    }
}

/// Outcome of one entry evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Enter(TradeSignal),
    StayOut { reason: StayOutReason },
    Wait { reason: WaitReason },
}

/// Flat view of a decision for collaborators that only need the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    StayOut,
    Wait,
}

impl Decision {
    pub fn wait(reason: WaitReason) -> Self {
        Self::Wait { reason }
    }

    pub fn stay_out(reason: StayOutReason) -> Self {
        Self::StayOut { reason }
    }

    pub fn signal(&self) -> Signal {
        match self {
            Self::Enter(s) => match s.side {
                Side::Buy => Signal::Buy,
                Side::Sell => Signal::Sell,
            },
            Self::StayOut { .. } => Signal::StayOut,
            Self::Wait { .. } => Signal::Wait,
        }
    }

    pub fn trade(&self) -> Option<&TradeSignal> {
        match self {
            Self::Enter(s) => Some(s),
            _ => None,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Self::Enter(s) => s.reason.clone(),
            Self::StayOut { reason } => reason.to_string(),
            Self::Wait { reason } => reason.to_string(),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::StayOut => "STAY_OUT",
            Self::Wait => "WAIT",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_flattening() {
        assert_eq!(
            Decision::wait(WaitReason::NoSweep).signal(),
            Signal::Wait
        );
        assert_eq!(
            Decision::stay_out(StayOutReason::SessionClosed).signal(),
            Signal::StayOut
        );
        assert_eq!(Signal::StayOut.to_string(), "STAY_OUT");
    }

    #[test]
    fn serializes_tagged() {
        let d = Decision::stay_out(StayOutReason::GateClosed { taken: 1, max: 1 });
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["decision"], "STAY_OUT");
        assert_eq!(json["reason"]["kind"], "gate_closed");
        let back: Decision = serde_json::from_value(json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn reasons_are_human_readable() {
        let d = Decision::wait(WaitReason::InsufficientData { have: 2, need: 3 });
        assert_eq!(d.reason(), "insufficient candles (2 of 3)");
    }
}
