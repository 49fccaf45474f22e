//! Runner configuration loaded from TOML.
//!
//! ```toml
//! assets = ["BTCUSDT", "ETHUSDT"]
//! sessions = ["LONDON", "NEW_YORK"]
//! state_file = "state.json"
//!
//! [feed]
//! source = "csv"
//! data_dir = "data"
//! timeout_ms = 2000
//! max_pending_fetches = 64
//!
//! [strategy]
//! name = "classic"
//! [strategy.reversal]
//! risk_reward = 3.0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sessionlab_core::domain::Session;
use sessionlab_core::StrategyConfig;

use crate::error::RunnerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    /// `<data_dir>/<ASSET>_<timeframe>.csv`
    Csv,
    /// Seeded random walk.
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub source: FeedSource,
    pub data_dir: PathBuf,
    /// Upper bound on a single candle fetch.
    pub timeout_ms: u64,
    /// Fetch threads allowed to be outstanding at once, including ones
    /// abandoned after a timeout. Further fetches fail fast.
    pub max_pending_fetches: usize,
    pub seed: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: FeedSource::Csv,
            data_dir: PathBuf::from("data"),
            timeout_ms: 2_000,
            max_pending_fetches: 64,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub assets: Vec<String>,
    pub sessions: Vec<Session>,
    /// JSON snapshot of foundations and trade counts, carried across runs.
    pub state_file: Option<PathBuf>,
    pub feed: FeedConfig,
    pub strategy: StrategyConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            assets: vec!["BTCUSDT".into()],
            sessions: Session::ALL.to_vec(),
            state_file: None,
            feed: FeedConfig::default(),
            strategy: StrategyConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, RunnerError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, RunnerError> {
        let text = std::fs::read_to_string(path).map_err(|e| RunnerError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, RunnerError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.assets.is_empty() {
            return Err(RunnerError::NoAssets);
        }
        if self.sessions.is_empty() {
            return Err(RunnerError::NoSessions);
        }
        self.strategy.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionlab_core::config::ConfirmationMode;

    #[test]
    fn default_round_trips_through_toml() {
        let config = RunnerConfig::default();
        let text = config.to_toml_string().unwrap();
        let back = RunnerConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config = RunnerConfig::from_toml_str(
            r#"
            assets = ["ETHUSDT"]
            sessions = ["NEW_YORK"]

            [feed]
            source = "synthetic"

            [strategy.reversal]
            confirmation = "range"
            "#,
        )
        .unwrap();
        assert_eq!(config.assets, vec!["ETHUSDT".to_string()]);
        assert_eq!(config.sessions, vec![Session::NewYork]);
        assert_eq!(config.feed.source, FeedSource::Synthetic);
        assert_eq!(config.feed.timeout_ms, 2_000);
        assert_eq!(config.strategy.reversal.confirmation, ConfirmationMode::Range);
        assert_eq!(config.strategy.reversal.risk_reward, 3.0);
    }

    #[test]
    fn empty_assets_rejected() {
        let err = RunnerConfig::from_toml_str("assets = []").unwrap_err();
        assert!(matches!(err, RunnerError::NoAssets));
    }

    #[test]
    fn invalid_strategy_rejected() {
        let err = RunnerConfig::from_toml_str(
            r#"
            [strategy.reversal]
            risk_reward = -1.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, RunnerError::Config(_)));
    }
}
