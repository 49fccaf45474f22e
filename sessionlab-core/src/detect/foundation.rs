//! Session foundation — the anchor high/low of a session's first candle.
//!
//! A foundation is created lazily, once per `(asset, session, date)`, and is
//! immutable afterwards. Lookup is tolerant: the first candle inside the
//! anchor window after session start, else the first candle after the
//! window, else the most recent candle available (degraded mode).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::FoundationConfig;
use crate::domain::{Candle, SessionKey};
use crate::store::{FoundationStore, StoreError};

/// Which lookup step produced the anchor candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoundationSource {
    /// First candle within `[start, start + window]`.
    Exact,
    /// First candle after the anchor window.
    NearestFollowing,
    /// No candle at or after session start; the latest candle was used.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Foundation {
    pub high: f64,
    pub low: f64,
    pub anchor_timestamp: DateTime<Utc>,
    pub source: FoundationSource,
}

impl Foundation {
    fn from_candle(candle: &Candle, source: FoundationSource) -> Self {
        Self {
            high: candle.high,
            low: candle.low,
            anchor_timestamp: candle.timestamp,
            source,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.source == FoundationSource::Fallback
    }
}

#[derive(Debug, Clone)]
pub struct FoundationManager {
    anchor_window: Duration,
}

impl FoundationManager {
    pub fn new(config: &FoundationConfig) -> Self {
        Self {
            anchor_window: Duration::minutes(config.anchor_window_minutes),
        }
    }

    /// Pick the anchor candle for a session starting at `session_start`.
    ///
    /// `candles` must be sorted oldest first. Returns `None` only when there
    /// are no candles at all.
    pub fn locate(&self, candles: &[Candle], session_start: DateTime<Utc>) -> Option<Foundation> {
        let window_end = session_start + self.anchor_window;
        if let Some(c) = candles
            .iter()
            .find(|c| c.timestamp >= session_start && c.timestamp <= window_end)
        {
            return Some(Foundation::from_candle(c, FoundationSource::Exact));
        }
        if let Some(c) = candles.iter().find(|c| c.timestamp > window_end) {
            return Some(Foundation::from_candle(c, FoundationSource::NearestFollowing));
        }
        candles
            .last()
            .map(|c| Foundation::from_candle(c, FoundationSource::Fallback))
    }

    /// Return the stored foundation for `key`, creating it from `candles` if absent.
    ///
    /// `Ok(None)` means "not yet available" (no candles to anchor on).
    pub fn resolve(
        &self,
        store: &dyn FoundationStore,
        key: &SessionKey,
        session_start: DateTime<Utc>,
        candles: &[Candle],
    ) -> Result<Option<Foundation>, StoreError> {
        if let Some(existing) = store.get_foundation(key)? {
            return Ok(Some(existing));
        }
        let Some(candidate) = self.locate(candles, session_start) else {
            debug!(%key, "no candles to anchor foundation on");
            return Ok(None);
        };
        if candidate.is_degraded() {
            warn!(
                %key,
                anchor = %candidate.anchor_timestamp,
                "no candle at or after session start, anchoring on latest candle"
            );
        }
        let stored = store.insert_foundation_if_absent(key, candidate)?;
        debug!(%key, high = stored.high, low = stored.low, source = ?stored.source, "foundation established");
        Ok(Some(stored))
    }
}
