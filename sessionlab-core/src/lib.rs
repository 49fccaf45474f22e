//! SessionLab Core — session-anchored pattern detection and position protection.
//!
//! This crate contains the decision logic:
//! - Domain types (candles, sessions, positions, identifiers)
//! - Detectors: session foundation, fair value gaps, liquidity sweeps,
//!   two-candle reversals with ambiguity resolution, trend validation
//! - Trade gate over a per-session executed-trade counter
//! - Decision engine composing the detectors into BUY / SELL / STAY_OUT / WAIT
//! - Position protection monitor for early-close decisions
//! - Keyed state stores and the candle feed trait

pub mod config;
pub mod context;
pub mod detect;
pub mod domain;
pub mod engine;
pub mod feed;
pub mod gate;
pub mod indicators;
pub mod protection;
pub mod store;

pub use config::{ConfigError, StrategyConfig, StrategyPreset};
pub use context::EvalContext;
pub use engine::{Decision, DecisionEngine, Signal};
pub use protection::{ClosureDecision, ProtectionMonitor};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across evaluation threads is
    /// Send + Sync. The runner evaluates `(asset, session)` pairs in parallel
    /// over one engine, so a regression here breaks the build immediately.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::SessionKey>();
        require_sync::<domain::SessionKey>();
        require_send::<domain::TradeCountKey>();
        require_sync::<domain::TradeCountKey>();
        require_send::<domain::CorrelationId>();
        require_sync::<domain::CorrelationId>();

        // Detectors
        require_send::<detect::FoundationManager>();
        require_sync::<detect::FoundationManager>();
        require_send::<detect::GapDetector>();
        require_sync::<detect::GapDetector>();
        require_send::<detect::ReversalResolver>();
        require_sync::<detect::ReversalResolver>();
        require_send::<detect::TrendValidator>();
        require_sync::<detect::TrendValidator>();

        // Engine, gate, protection
        require_send::<DecisionEngine>();
        require_sync::<DecisionEngine>();
        require_send::<gate::TradeGate>();
        require_sync::<gate::TradeGate>();
        require_send::<ProtectionMonitor>();
        require_sync::<ProtectionMonitor>();
        require_send::<Decision>();
        require_sync::<Decision>();
        require_send::<ClosureDecision>();
        require_sync::<ClosureDecision>();

        // Stores and feeds
        require_send::<store::InMemoryStore>();
        require_sync::<store::InMemoryStore>();
        require_send::<feed::StaticFeed>();
        require_sync::<feed::StaticFeed>();
    }

    /// Architecture contract: detectors see candles only.
    ///
    /// None of the pattern detectors accept store, gate or position state;
    /// only the foundation step touches the store, through its trait.
    #[test]
    fn detectors_take_candles_only() {
        fn _check(
            candles: &[domain::Candle],
            f: &detect::Foundation,
            gaps: &detect::GapDetector,
            trend: &detect::TrendValidator,
        ) {
            let _ = detect::detect_sweep(candles, f);
            let _ = gaps.detect(candles);
            let _ = trend.classify(candles);
        }
    }
}
