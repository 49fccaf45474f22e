//! Pattern detectors — pure functions of candle windows.
//!
//! - [`foundation`] — session anchor high/low (the only stateful step, via the store)
//! - [`fvg`] — three-candle fair value gaps with quality scores
//! - [`sweep`] — closes beyond a foundation level
//! - [`reversal`] — two-candle reversals and the ambiguity resolver
//! - [`trend`] — strict five-criterion trend validation
//!
//! Detectors never see portfolio or order state and never fail: missing data
//! is reported as "nothing found".

pub mod foundation;
pub mod fvg;
pub mod reversal;
pub mod sweep;
pub mod trend;

pub use foundation::{Foundation, FoundationManager, FoundationSource};
pub use fvg::{Gap, GapDetector, GapQuality};
pub use reversal::{
    find_reversal, EntryPlan, Resolution, ResolverPhase, ReversalResolver, TwoCandleReversal,
};
pub use sweep::{detect_sweep, Sweep, SweepSide};
pub use trend::{TrendCriteria, TrendValidation, TrendValidator, VolumeTrend};
