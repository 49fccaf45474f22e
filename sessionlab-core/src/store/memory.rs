//! In-memory store backed by `DashMap`.
//!
//! Shard-level locking through the entry API gives the atomic
//! insert-if-absent and increment the store contracts require.

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::{FoundationStore, StoreError, TradeCountStore};
use crate::detect::foundation::Foundation;
use crate::domain::{SessionKey, TradeCountKey};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    foundations: DashMap<SessionKey, Foundation>,
    trade_counts: DashMap<TradeCountKey, u32>,
}

/// Serializable copy of a store's contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub foundations: Vec<(SessionKey, Foundation)>,
    pub trade_counts: Vec<(TradeCountKey, u32)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        for (key, foundation) in snapshot.foundations {
            store.foundations.insert(key, foundation);
        }
        for (key, count) in snapshot.trade_counts {
            store.trade_counts.insert(key, count);
        }
        store
    }

    /// Sorted copy of the contents.
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut foundations: Vec<_> = self
            .foundations
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        foundations.sort_by(|a, b| a.0.cmp(&b.0));
        let mut trade_counts: Vec<_> = self
            .trade_counts
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        trade_counts.sort_by(|a, b| a.0.cmp(&b.0));
        StoreSnapshot {
            foundations,
            trade_counts,
        }
    }

    /// Fold another copy of the state into this one.
    ///
    /// Foundations are write-once, so a stored one is kept. Trade counts only
    /// ever grow, so the larger count wins; a stale copy can never lower one.
    pub fn merge(&self, snapshot: StoreSnapshot) {
        for (key, foundation) in snapshot.foundations {
            self.foundations.entry(key).or_insert(foundation);
        }
        for (key, count) in snapshot.trade_counts {
            let mut entry = self.trade_counts.entry(key).or_insert(count);
            *entry = (*entry).max(count);
        }
    }

    /// Drop every record dated before `date`. Returns the number removed.
    pub fn prune_before(&self, date: NaiveDate) -> usize {
        let before = self.foundations.len() + self.trade_counts.len();
        self.foundations.retain(|key, _| key.date >= date);
        self.trade_counts.retain(|key, _| key.date >= date);
        before - (self.foundations.len() + self.trade_counts.len())
    }

    pub fn foundation_count(&self) -> usize {
        self.foundations.len()
    }
}

impl FoundationStore for InMemoryStore {
    fn get_foundation(&self, key: &SessionKey) -> Result<Option<Foundation>, StoreError> {
        Ok(self.foundations.get(key).map(|f| *f))
    }

    fn insert_foundation_if_absent(
        &self,
        key: &SessionKey,
        foundation: Foundation,
    ) -> Result<Foundation, StoreError> {
        Ok(*self.foundations.entry(key.clone()).or_insert(foundation))
    }
}

impl TradeCountStore for InMemoryStore {
    fn trade_count(&self, key: &TradeCountKey) -> Result<u32, StoreError> {
        Ok(self.trade_counts.get(key).map(|c| *c).unwrap_or(0))
    }

    fn increment_trade_count(&self, key: &TradeCountKey) -> Result<u32, StoreError> {
        let mut entry = self.trade_counts.entry(key.clone()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::foundation::FoundationSource;
    use crate::domain::Session;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::thread;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn foundation(high: f64) -> Foundation {
        Foundation {
            high,
            low: high - 10.0,
            anchor_timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap(),
            source: FoundationSource::Exact,
        }
    }

    #[test]
    fn first_foundation_wins() {
        let store = InMemoryStore::new();
        let key = SessionKey::new("BTCUSDT", Session::London, date());
        let a = store.insert_foundation_if_absent(&key, foundation(100.0)).unwrap();
        let b = store.insert_foundation_if_absent(&key, foundation(200.0)).unwrap();
        assert_eq!(a.high, 100.0);
        assert_eq!(b.high, 100.0);
        assert_eq!(store.get_foundation(&key).unwrap().unwrap().high, 100.0);
    }

    #[test]
    fn concurrent_inserts_agree() {
        let store = Arc::new(InMemoryStore::new());
        let key = SessionKey::new("BTCUSDT", Session::London, date());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let key = key.clone();
                thread::spawn(move || {
                    store
                        .insert_foundation_if_absent(&key, foundation(100.0 + i as f64))
                        .unwrap()
                })
            })
            .collect();
        let results: Vec<Foundation> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.foundation_count(), 1);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryStore::new());
        let key = TradeCountKey {
            asset: None,
            session: Session::London,
            date: date(),
        };
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let key = key.clone();
                thread::spawn(move || store.increment_trade_count(&key).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.trade_count(&key).unwrap(), 16);
    }

    #[test]
    fn merge_keeps_larger_counts_and_first_foundation() {
        let key = SessionKey::new("BTCUSDT", Session::London, date());
        let counted = TradeCountKey {
            asset: None,
            session: Session::London,
            date: date(),
        };
        let other = TradeCountKey {
            session: Session::NewYork,
            ..counted.clone()
        };

        let store = InMemoryStore::new();
        store.insert_foundation_if_absent(&key, foundation(105.0)).unwrap();
        store.increment_trade_count(&counted).unwrap();

        store.merge(StoreSnapshot {
            foundations: vec![(key.clone(), foundation(200.0))],
            trade_counts: vec![(counted.clone(), 0), (other.clone(), 2)],
        });

        assert_eq!(store.get_foundation(&key).unwrap().unwrap().high, 105.0);
        assert_eq!(store.trade_count(&counted).unwrap(), 1);
        assert_eq!(store.trade_count(&other).unwrap(), 2);
    }

    #[test]
    fn snapshot_restore_and_prune() {
        let store = InMemoryStore::new();
        let old = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        store
            .insert_foundation_if_absent(&SessionKey::new("BTCUSDT", Session::Asia, old), foundation(110.0))
            .unwrap();
        store
            .insert_foundation_if_absent(&SessionKey::new("BTCUSDT", Session::London, date()), foundation(120.0))
            .unwrap();
        store
            .increment_trade_count(&TradeCountKey {
                asset: None,
                session: Session::Asia,
                date: old,
            })
            .unwrap();

        let snapshot = store.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = InMemoryStore::from_snapshot(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.snapshot(), snapshot);

        assert_eq!(restored.prune_before(date()), 2);
        assert_eq!(restored.foundation_count(), 1);
    }
}
