//! Keyed state stores — the only cross-call mutable state of the engine.
//!
//! Foundations are write-once per `(asset, session, date)`; trade counts are
//! monotonically incremented per `TradeCountKey`. Both contracts must be
//! atomic under concurrent polling loops: `insert_if_absent` never lets two
//! different foundations exist for one key, and `increment` never loses or
//! double-counts an update. Persistence backends implement these traits; the
//! engine only ever sees the trait objects.

pub mod memory;

pub use memory::{InMemoryStore, StoreSnapshot};

use thiserror::Error;

use crate::detect::foundation::Foundation;
use crate::domain::{SessionKey, TradeCountKey};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected write for {key}: {reason}")]
    Rejected { key: String, reason: String },
}

/// Write-once storage of session foundations.
pub trait FoundationStore: Send + Sync {
    fn get_foundation(&self, key: &SessionKey) -> Result<Option<Foundation>, StoreError>;

    /// Store `foundation` unless one already exists; return whichever is stored.
    fn insert_foundation_if_absent(
        &self,
        key: &SessionKey,
        foundation: Foundation,
    ) -> Result<Foundation, StoreError>;
}

/// Per-session executed-trade counters.
pub trait TradeCountStore: Send + Sync {
    fn trade_count(&self, key: &TradeCountKey) -> Result<u32, StoreError>;

    /// Atomically add one executed trade; returns the new count.
    fn increment_trade_count(&self, key: &TradeCountKey) -> Result<u32, StoreError>;
}
