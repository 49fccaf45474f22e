use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Session;

/// Correlation id attached to every log line of one evaluation.
///
/// Derived deterministically from the evaluation's inputs so the same tick
/// replayed twice produces the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn derive(asset: &str, session: Option<Session>, at: DateTime<Utc>, sequence: u64) -> Self {
        let session = session.map(Session::as_str).unwrap_or("-");
        let canonical = format!("{asset}|{session}|{}|{sequence}", at.timestamp_millis());
        let hash = blake3::hash(canonical.as_bytes());
        // 16 hex chars is plenty to tell ticks apart in logs.
        Self(hash.to_hex()[..16].to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content hash of a strategy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    pub fn from_json(canonical_json: &str) -> Self {
        Self(blake3::hash(canonical_json.as_bytes()).to_hex().to_string())
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn correlation_id_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 8, 15, 0).unwrap();
        let a = CorrelationId::derive("BTCUSDT", Some(Session::London), at, 1);
        let b = CorrelationId::derive("BTCUSDT", Some(Session::London), at, 1);
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 16);
    }

    #[test]
    fn correlation_id_changes_with_sequence() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 8, 15, 0).unwrap();
        let a = CorrelationId::derive("BTCUSDT", Some(Session::London), at, 1);
        let b = CorrelationId::derive("BTCUSDT", Some(Session::London), at, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn config_hash_is_hex() {
        let h = ConfigHash::from_json("{}");
        assert_eq!(h.0.len(), 64);
        assert!(h.0.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
