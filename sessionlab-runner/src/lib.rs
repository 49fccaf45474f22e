//! SessionLab Runner — tick orchestration, candle feeds, config and state.
//!
//! This crate builds on `sessionlab-core` to provide:
//! - TOML runner configuration (assets, sessions, feed, strategy)
//! - CSV, synthetic and timeout-bounded candle feeds
//! - Parallel tick evaluation over `(asset, session)` pairs and open positions
//! - JSON snapshots of foundations and trade counts between runs, with a
//!   lock file so overlapping runs do not lose counts

pub mod config;
pub mod error;
pub mod feed;
pub mod runner;
pub mod state;

pub use config::{FeedConfig, FeedSource, RunnerConfig};
pub use error::RunnerError;
pub use feed::{write_csv, CsvFeed, SyntheticFeed, TimeoutFeed};
pub use runner::{build_feed, EntryReport, ProtectionReport, TickReport, TickRunner};
pub use state::{load_store, save_store, StateLock};
