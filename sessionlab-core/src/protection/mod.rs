//! Position protection monitor — early-close decisions for open positions.
//!
//! Zones by current reward:risk:
//!
//! ```text
//!   rr < floor            Hold      no candles fetched
//!   floor <= rr < let_run Protection  score the last one-minute candles
//!   rr >= let_run         LetRun    no candles fetched, ride to target
//! ```
//!
//! In the protection zone, confirmed weakness closes, confirmed continuity
//! holds, and anything in between closes. Missing data always holds: the
//! monitor never forces a close it could not validate.

pub mod scoring;

pub use scoring::{
    ContinuityScore, ProtectionScores, WeaknessScore, CONTINUITY_THRESHOLD, RECENT_CANDLES,
    WEAKNESS_THRESHOLD,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ProtectionConfig;
use crate::context::EvalContext;
use crate::domain::{Candle, Position};
use crate::feed::{normalize, CandleFeed, FeedError};

/// Maximum points either score can reach.
const MAX_SCORE: f64 = 9.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtectionZone {
    /// Below the protection floor; normal stop/target management.
    Hold,
    Protection,
    LetRun,
}

impl ProtectionZone {
    pub fn classify(rr: f64, config: &ProtectionConfig) -> Self {
        if rr < config.protection_floor {
            Self::Hold
        } else if rr >= config.let_run_rr {
            Self::LetRun
        } else {
            Self::Protection
        }
    }
}

/// Close/hold verdict for one open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClosureDecision {
    Hold {
        /// `None` when the reward:risk could not be computed.
        zone: Option<ProtectionZone>,
        current_rr: Option<f64>,
        confidence: f64,
        reason: String,
        /// Present only when candle analysis ran.
        scores: Option<ProtectionScores>,
    },
    Close {
        current_rr: f64,
        confidence: f64,
        reason: String,
        scores: ProtectionScores,
    },
}

impl ClosureDecision {
    pub fn should_close(&self) -> bool {
        matches!(self, Self::Close { .. })
    }

    pub fn current_rr(&self) -> Option<f64> {
        match self {
            Self::Hold { current_rr, .. } => *current_rr,
            Self::Close { current_rr, .. } => Some(*current_rr),
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::Hold { confidence, .. } | Self::Close { confidence, .. } => *confidence,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Hold { reason, .. } | Self::Close { reason, .. } => reason,
        }
    }

    pub fn scores(&self) -> Option<&ProtectionScores> {
        match self {
            Self::Hold { scores, .. } => scores.as_ref(),
            Self::Close { scores, .. } => Some(scores),
        }
    }

    fn hold_without_analysis(zone: Option<ProtectionZone>, current_rr: Option<f64>, confidence: f64, reason: String) -> Self {
        Self::Hold {
            zone,
            current_rr,
            confidence,
            reason,
            scores: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProtectionMonitor {
    config: ProtectionConfig,
}

impl ProtectionMonitor {
    pub fn new(config: &ProtectionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &ProtectionConfig {
        &self.config
    }

    /// Evaluate `position`, fetching candles from `feed` only in the
    /// protection zone.
    pub fn evaluate(&self, ctx: &EvalContext, position: &Position, feed: &dyn CandleFeed) -> ClosureDecision {
        let _span = ctx.span().entered();
        let decision = self.decide(position, || {
            feed.candles(&position.asset, self.config.timeframe, self.config.window)
                .map(normalize)
        });
        log_decision(&decision);
        decision
    }

    /// Evaluate over an already-fetched candle window (oldest first).
    pub fn evaluate_candles(&self, ctx: &EvalContext, position: &Position, candles: &[Candle]) -> ClosureDecision {
        let _span = ctx.span().entered();
        let decision = self.decide(position, || Ok(candles.to_vec()));
        log_decision(&decision);
        decision
    }

    fn decide<F>(&self, position: &Position, fetch: F) -> ClosureDecision
    where
        F: FnOnce() -> Result<Vec<Candle>, FeedError>,
    {
        let Some(rr) = position.risk_reward() else {
            warn!(asset = %position.asset, "reward:risk undefined, holding");
            return ClosureDecision::hold_without_analysis(
                None,
                None,
                0.0,
                "reward:risk undefined (zero risk distance)".into(),
            );
        };

        let zone = ProtectionZone::classify(rr, &self.config);
        match zone {
            ProtectionZone::Hold => {
                return ClosureDecision::hold_without_analysis(
                    Some(zone),
                    Some(rr),
                    1.0,
                    format!("RR {rr:.2} below protection floor {:.2}", self.config.protection_floor),
                )
            }
            ProtectionZone::LetRun => {
                return ClosureDecision::hold_without_analysis(
                    Some(zone),
                    Some(rr),
                    1.0,
                    format!("RR {rr:.2} past {:.2}, letting it run to target", self.config.let_run_rr),
                )
            }
            ProtectionZone::Protection => {}
        }

        let candles = match fetch() {
            Ok(c) => c,
            Err(e) => {
                warn!(asset = %position.asset, error = %e, "protection candles unavailable, holding");
                return ClosureDecision::hold_without_analysis(
                    Some(zone),
                    Some(rr),
                    0.0,
                    format!("candles unavailable: {e}"),
                );
            }
        };
        let window = &candles[candles.len().saturating_sub(self.config.window)..];
        let need = self.config.min_candles.max(RECENT_CANDLES + 1);
        if window.len() < need {
            return ClosureDecision::hold_without_analysis(
                Some(zone),
                Some(rr),
                0.0,
                format!("insufficient candles ({} of {need})", window.len()),
            );
        }

        let scores = ProtectionScores::compute(window, position.side.direction(), &self.config);
        let (continuity, weakness) = (scores.continuity.total(), scores.weakness.total());
        debug!(continuity, weakness, rr, "protection zone scored");

        if scores.weakness.confirmed() {
            ClosureDecision::Close {
                current_rr: rr,
                confidence: 0.5 + 0.5 * f64::from(weakness) / MAX_SCORE,
                reason: format!("weakness confirmed ({weakness}/{WEAKNESS_THRESHOLD}), protecting profit"),
                scores,
            }
        } else if scores.continuity.confirmed() {
            ClosureDecision::Hold {
                zone: Some(zone),
                current_rr: Some(rr),
                confidence: 0.5 + 0.5 * f64::from(continuity) / MAX_SCORE,
                reason: format!("continuity confirmed ({continuity}/{CONTINUITY_THRESHOLD}), holding to target"),
                scores: Some(scores),
            }
        } else {
            ClosureDecision::Close {
                current_rr: rr,
                confidence: 0.5,
                reason: format!(
                    "momentum indeterminate (continuity {continuity}, weakness {weakness}), closing"
                ),
                scores,
            }
        }
    }
}

fn log_decision(decision: &ClosureDecision) {
    info!(
        should_close = decision.should_close(),
        current_rr = decision.current_rr(),
        reason = decision.reason(),
        "protection decision"
    );
}
