//! Entry-path decision engine.
//!
//! The [`DecisionEngine`] composes the detectors into one evaluation per
//! `(asset, session)` tick:
//!
//! 1. Session window: not started ⇒ wait, ended ⇒ stay out
//! 2. Foundation: stored anchor high/low for the day
//! 3. Sweep: most recent close beyond the foundation
//! 4. Reversal resolver: direct entry, resolved ambiguity, or wait
//! 5. Trend and gap adjustments to confidence (counter-trend veto)
//! 6. Trade gate: one executed trade per session per day by default

pub mod aggregator;
pub mod decision;

pub use aggregator::{DecisionEngine, MIN_ENTRY_CANDLES};
pub use decision::{Decision, EntrySetup, Signal, StayOutReason, TradeSignal, WaitReason};
