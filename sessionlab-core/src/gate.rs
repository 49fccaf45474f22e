//! Trade gate — caps executed trades per session and day.
//!
//! The gate only reads the counter. The increment belongs to the
//! order-placement side and happens once an order is confirmed executed,
//! through [`TradeGate::record_execution`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{GateConfig, GateScope};
use crate::domain::{Session, TradeCountKey};
use crate::store::{StoreError, TradeCountStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateVerdict {
    Open { taken: u32, max: u32 },
    Closed { taken: u32, max: u32 },
}

impl GateVerdict {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TradeGate {
    max_per_session: u32,
    scope: GateScope,
}

impl TradeGate {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            max_per_session: config.max_per_session,
            scope: config.scope,
        }
    }

    pub fn key(&self, asset: &str, session: Session, date: NaiveDate) -> TradeCountKey {
        TradeCountKey {
            asset: match self.scope {
                GateScope::PerSession => None,
                GateScope::PerAsset => Some(asset.to_string()),
            },
            session,
            date,
        }
    }

    pub fn check(
        &self,
        store: &dyn TradeCountStore,
        asset: &str,
        session: Session,
        date: NaiveDate,
    ) -> Result<GateVerdict, StoreError> {
        let taken = store.trade_count(&self.key(asset, session, date))?;
        let max = self.max_per_session;
        Ok(if taken >= max {
            GateVerdict::Closed { taken, max }
        } else {
            GateVerdict::Open { taken, max }
        })
    }

    /// Count one executed trade. Call only after the fill is confirmed.
    pub fn record_execution(
        &self,
        store: &dyn TradeCountStore,
        asset: &str,
        session: Session,
        date: NaiveDate,
    ) -> Result<u32, StoreError> {
        let key = self.key(asset, session, date);
        let count = store.increment_trade_count(&key)?;
        info!(%key, count, "executed trade recorded");
        Ok(count)
    }
}
