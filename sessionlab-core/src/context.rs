//! Per-evaluation context: correlation id plus a tracing span.

use chrono::{DateTime, Utc};
use tracing::Span;

use crate::domain::{CorrelationId, Session};

/// Carried through one entry or protection evaluation so every log line of
/// that evaluation can be tied back to the tick that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalContext {
    pub correlation_id: CorrelationId,
    pub asset: String,
    pub session: Option<Session>,
}

impl EvalContext {
    pub fn new(correlation_id: CorrelationId, asset: impl Into<String>, session: Option<Session>) -> Self {
        Self {
            correlation_id,
            asset: asset.into(),
            session,
        }
    }

    /// Context with an id derived from `(asset, session, at, sequence)`.
    pub fn derive(asset: &str, session: Option<Session>, at: DateTime<Utc>, sequence: u64) -> Self {
        Self::new(
            CorrelationId::derive(asset, session, at, sequence),
            asset,
            session,
        )
    }

    pub fn span(&self) -> Span {
        tracing::info_span!(
            "eval",
            correlation_id = %self.correlation_id,
            asset = %self.asset,
            session = self.session.map(Session::as_str).unwrap_or("-"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn derive_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 8, 15, 0).unwrap();
        let a = EvalContext::derive("BTCUSDT", Some(Session::London), at, 0);
        let b = EvalContext::derive("BTCUSDT", Some(Session::London), at, 0);
        assert_eq!(a, b);
        assert_eq!(a.asset, "BTCUSDT");
        // Entering the span without a subscriber is a no-op.
        let _guard = a.span().entered();
    }
}
