//! Domain types for SessionLab

pub mod candle;
pub mod direction;
pub mod ids;
pub mod position;
pub mod session;
pub mod timeframe;

pub use candle::{mean_range, mean_volume, Candle};
pub use direction::{Direction, Side};
pub use ids::{ConfigHash, CorrelationId};
pub use position::Position;
pub use session::{
    ParseSessionError, Session, SessionKey, SessionPhase, SessionWindow, TradeCountKey,
};
pub use timeframe::{ParseTimeframeError, Timeframe};

/// Asset symbol type alias
pub type Asset = String;
