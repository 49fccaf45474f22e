//! Strategy configuration — one parameterised engine, many strategies.
//!
//! Every tunable threshold of the detectors, the aggregator, the trade gate
//! and the protection monitor lives here. A strategy variant is a value of
//! `StrategyConfig`, built from a preset, a TOML file or the builder.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::domain::{ConfigHash, Session, SessionWindow, Timeframe};

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be within [0, 1] (got {value})")]
    NotAFraction { field: &'static str, value: f64 },

    #[error("{field} must be at least {min} (got {value})")]
    WindowTooSmall {
        field: &'static str,
        min: usize,
        value: usize,
    },

    #[error("protection zone is inverted: floor {floor} must be below let-run threshold {let_run}")]
    InvertedProtectionZone { floor: f64, let_run: f64 },

    #[error("resolved confidence ({resolved}) must exceed direct-entry confidence ({direct})")]
    ConfidenceOrdering { direct: f64, resolved: f64 },

    #[error("{session} window starting {start} for {duration_minutes} minutes must be positive and end by midnight UTC")]
    InvalidSessionWindow {
        session: Session,
        start: NaiveTime,
        duration_minutes: i64,
    },

    #[error("unknown preset '{0}' (expected classic, conservative or active)")]
    UnknownPreset(String),
}

/// Full strategy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Human-readable strategy name, carried into logs.
    pub name: String,
    /// Timeframe of the entry-path candles (foundation, sweep, 2CR, trend).
    pub timeframe: Timeframe,
    /// How many entry-path candles to request per evaluation.
    pub candle_limit: usize,
    pub sessions: SessionsConfig,
    pub foundation: FoundationConfig,
    pub fvg: FvgConfig,
    pub reversal: ReversalConfig,
    pub trend: TrendConfig,
    pub gate: GateConfig,
    pub protection: ProtectionConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: "classic".into(),
            timeframe: Timeframe::M5,
            candle_limit: 200,
            sessions: SessionsConfig::default(),
            foundation: FoundationConfig::default(),
            fvg: FvgConfig::default(),
            reversal: ReversalConfig::default(),
            trend: TrendConfig::default(),
            gate: GateConfig::default(),
            protection: ProtectionConfig::default(),
        }
    }
}

impl StrategyConfig {
    pub fn builder() -> StrategyConfigBuilder {
        StrategyConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("reversal.risk_reward", self.reversal.risk_reward)?;
        fraction("reversal.invalidation_buffer", self.reversal.invalidation_buffer)?;
        fraction("reversal.direct_confidence", self.reversal.direct_confidence)?;
        fraction("reversal.resolved_confidence", self.reversal.resolved_confidence)?;
        if self.reversal.resolved_confidence <= self.reversal.direct_confidence {
            return Err(ConfigError::ConfidenceOrdering {
                direct: self.reversal.direct_confidence,
                resolved: self.reversal.resolved_confidence,
            });
        }
        min_window("reversal.lookahead", 2, self.reversal.lookahead)?;

        min_window("fvg.window", 3, self.fvg.window)?;
        fraction("fvg.min_impulse_body_ratio", self.fvg.min_impulse_body_ratio)?;
        fraction("fvg.max_distance_fraction", self.fvg.max_distance_fraction)?;
        fraction("fvg.min_gap_fraction", self.fvg.min_gap_fraction)?;

        min_window("trend.window", 5, self.trend.window)?;
        min_window("trend.sma_period", 1, self.trend.sma_period)?;
        fraction("trend.structure_ratio", self.trend.structure_ratio)?;
        fraction("trend.volume_flat_band", self.trend.volume_flat_band)?;

        for session in Session::ALL {
            let window = self.sessions.window(session);
            if !window.fits_in_day() {
                return Err(ConfigError::InvalidSessionWindow {
                    session,
                    start: window.start,
                    duration_minutes: window.duration_minutes,
                });
            }
        }

        positive(
            "foundation.anchor_window_minutes",
            self.foundation.anchor_window_minutes as f64,
        )?;

        positive("protection.protection_floor", self.protection.protection_floor)?;
        if self.protection.let_run_rr <= self.protection.protection_floor {
            return Err(ConfigError::InvertedProtectionZone {
                floor: self.protection.protection_floor,
                let_run: self.protection.let_run_rr,
            });
        }
        min_window("protection.min_candles", 4, self.protection.min_candles)?;
        min_window(
            "protection.window",
            self.protection.min_candles,
            self.protection.window,
        )?;
        min_window("candle_limit", self.trend.window, self.candle_limit)?;
        Ok(())
    }

    /// Content hash of the canonical JSON form.
    pub fn fingerprint(&self) -> ConfigHash {
        // Struct fields serialize in declaration order, so the JSON is canonical.
        let json = serde_json::to_string(self).unwrap_or_default();
        ConfigHash::from_json(&json)
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::NotAFraction { field, value })
    }
}

fn min_window(field: &'static str, min: usize, value: usize) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::WindowTooSmall { field, min, value })
    }
}

/// Session start times (UTC) and lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub asia: SessionWindow,
    pub london: SessionWindow,
    pub new_york: SessionWindow,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            asia: SessionWindow::new(hm(0, 0), 420),
            london: SessionWindow::new(hm(8, 0), 300),
            new_york: SessionWindow::new(hm(13, 30), 270),
        }
    }
}

impl SessionsConfig {
    pub fn window(&self, session: Session) -> SessionWindow {
        match session {
            Session::Asia => self.asia,
            Session::London => self.london,
            Session::NewYork => self.new_york,
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoundationConfig {
    /// Width of the exact anchor window after session start.
    pub anchor_window_minutes: i64,
}

impl Default for FoundationConfig {
    fn default() -> Self {
        Self {
            anchor_window_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FvgConfig {
    /// Number of most recent candles scanned for gaps.
    pub window: usize,
    /// Minimum body/range of the middle candle for the gap to count at all.
    pub min_impulse_body_ratio: f64,
    /// Body/range above which the middle candle earns a quality point.
    pub strong_body_ratio: f64,
    /// Gap size (fraction of price) above which the gap earns a quality point.
    pub min_gap_fraction: f64,
    /// Gaps farther than this fraction of price are ignored by selection.
    pub max_distance_fraction: f64,
    /// Minimum quality score for selection.
    pub min_quality: u8,
    /// Confidence added to a signal backed by a qualifying gap.
    pub confidence_bonus: f64,
}

impl Default for FvgConfig {
    fn default() -> Self {
        Self {
            window: 20,
            min_impulse_body_ratio: 0.5,
            strong_body_ratio: 0.6,
            min_gap_fraction: 0.001,
            max_distance_fraction: 0.02,
            min_quality: 2,
            confidence_bonus: 0.05,
        }
    }
}

/// How candle2 of a two-candle reversal confirms candle1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    /// Candle2 must close beyond candle1's extreme.
    Close,
    /// Candle2 only needs to trade beyond candle1's extreme.
    Range,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReversalConfig {
    /// Candles scanned forward at each resolver step.
    pub lookahead: usize,
    pub confirmation: ConfirmationMode,
    /// Fixed reward:risk of every entry plan.
    pub risk_reward: f64,
    /// Stop buffer beyond the opposing level on a resolved entry (fraction of price).
    pub invalidation_buffer: f64,
    pub direct_confidence: f64,
    pub resolved_confidence: f64,
}

impl Default for ReversalConfig {
    fn default() -> Self {
        Self {
            lookahead: 20,
            confirmation: ConfirmationMode::Close,
            risk_reward: 3.0,
            invalidation_buffer: 0.001,
            direct_confidence: 0.70,
            resolved_confidence: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Candles examined by the validator.
    pub window: usize,
    /// Most recent candles checked for directional closes.
    pub recent_candles: usize,
    pub min_directional_closes: usize,
    /// Fraction of consecutive pairs that must show the structure.
    pub structure_ratio: f64,
    /// Relative volume change treated as flat.
    pub volume_flat_band: f64,
    pub sma_period: usize,
    /// Veto signals that run against a validated trend.
    pub reject_counter_trend: bool,
    /// Confidence added when the signal runs with a validated trend.
    pub alignment_bonus: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window: 15,
            recent_candles: 5,
            min_directional_closes: 3,
            structure_ratio: 0.6,
            volume_flat_band: 0.10,
            sma_period: 10,
            reject_counter_trend: true,
            alignment_bonus: 0.05,
        }
    }
}

/// Scope of the per-session trade cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateScope {
    /// One counter per session and day, shared by all assets.
    PerSession,
    /// One counter per asset, session and day.
    PerAsset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub max_per_session: u32,
    pub scope: GateScope,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_per_session: 1,
            scope: GateScope::PerSession,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// RR below which positions are simply held.
    pub protection_floor: f64,
    /// RR at or above which positions ride to target.
    pub let_run_rr: f64,
    pub timeframe: Timeframe,
    /// Candles requested for scoring.
    pub window: usize,
    /// Fewer candles than this means insufficient data (hold).
    pub min_candles: usize,
    pub strong_body_ratio: f64,
    /// Wick against the trade, as a fraction of range, that counts as large.
    pub opposing_wick_ratio: f64,
    /// Range below this fraction of the window's mean range is lateral.
    pub lateral_range_ratio: f64,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            protection_floor: 1.0,
            let_run_rr: 1.5,
            timeframe: Timeframe::M1,
            window: 8,
            min_candles: 5,
            strong_body_ratio: 0.6,
            opposing_wick_ratio: 0.5,
            lateral_range_ratio: 0.5,
        }
    }
}

/// Fluent builder over `StrategyConfig` for the commonly tuned knobs.
#[derive(Debug, Clone)]
pub struct StrategyConfigBuilder {
    config: StrategyConfig,
}

impl StrategyConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.config.timeframe = timeframe;
        self
    }

    pub fn risk_reward(mut self, rr: f64) -> Self {
        self.config.reversal.risk_reward = rr;
        self
    }

    pub fn lookahead(mut self, candles: usize) -> Self {
        self.config.reversal.lookahead = candles;
        self
    }

    pub fn confirmation(mut self, mode: ConfirmationMode) -> Self {
        self.config.reversal.confirmation = mode;
        self
    }

    pub fn max_trades_per_session(mut self, max: u32) -> Self {
        self.config.gate.max_per_session = max;
        self
    }

    pub fn gate_scope(mut self, scope: GateScope) -> Self {
        self.config.gate.scope = scope;
        self
    }

    pub fn min_gap_quality(mut self, quality: u8) -> Self {
        self.config.fvg.min_quality = quality;
        self
    }

    pub fn reject_counter_trend(mut self, reject: bool) -> Self {
        self.config.trend.reject_counter_trend = reject;
        self
    }

    pub fn protection_zone(mut self, floor: f64, let_run: f64) -> Self {
        self.config.protection.protection_floor = floor;
        self.config.protection.let_run_rr = let_run;
        self
    }

    pub fn session_window(mut self, session: Session, window: SessionWindow) -> Self {
        match session {
            Session::Asia => self.config.sessions.asia = window,
            Session::London => self.config.sessions.london = window,
            Session::NewYork => self.config.sessions.new_york = window,
        }
        self
    }

    pub fn build(self) -> Result<StrategyConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Named strategy presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyPreset {
    /// One trade per session, 3:1, counter-trend veto.
    Classic,
    /// Close-confirmed patterns, high-quality gaps, longer trend window.
    Conservative,
    /// Two trades per asset per session, range confirmation.
    Active,
}

impl StrategyPreset {
    pub fn to_config(self) -> StrategyConfig {
        match self {
            Self::Classic => StrategyConfig::default(),
            Self::Conservative => {
                let mut config = StrategyConfig {
                    name: "conservative".into(),
                    ..StrategyConfig::default()
                };
                config.fvg.min_quality = 3;
                config.trend.window = 20;
                config.trend.structure_ratio = 0.7;
                config.reversal.confirmation = ConfirmationMode::Close;
                config
            }
            Self::Active => {
                let mut config = StrategyConfig {
                    name: "active".into(),
                    ..StrategyConfig::default()
                };
                config.gate.max_per_session = 2;
                config.gate.scope = GateScope::PerAsset;
                config.reversal.confirmation = ConfirmationMode::Range;
                config.trend.reject_counter_trend = false;
                config
            }
        }
    }
}

impl FromStr for StrategyPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "conservative" => Ok(Self::Conservative),
            "active" => Ok(Self::Active),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }
}
