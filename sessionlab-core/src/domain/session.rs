//! Trading sessions and the keys that scope per-day session state.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named trading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Session {
    Asia,
    London,
    NewYork,
}

impl Session {
    pub const ALL: [Session; 3] = [Session::Asia, Session::London, Session::NewYork];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asia => "ASIA",
            Self::London => "LONDON",
            Self::NewYork => "NEW_YORK",
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown session '{0}' (expected ASIA, LONDON or NEW_YORK)")]
pub struct ParseSessionError(pub String);

impl FromStr for Session {
    type Err = ParseSessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace(&['-', ' '][..], "_").as_str() {
            "ASIA" => Ok(Self::Asia),
            "LONDON" => Ok(Self::London),
            "NEW_YORK" | "NEWYORK" | "NY" => Ok(Self::NewYork),
            _ => Err(ParseSessionError(s.to_string())),
        }
    }
}

/// Start time (UTC) and length of a session on any given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub duration_minutes: i64,
}

impl SessionWindow {
    pub fn new(start: NaiveTime, duration_minutes: i64) -> Self {
        Self {
            start,
            duration_minutes,
        }
    }

    /// Session start on `date`.
    pub fn start_on(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.start).and_utc()
    }

    /// Session end on `date`.
    pub fn end_on(&self, date: NaiveDate) -> DateTime<Utc> {
        self.start_on(date) + Duration::minutes(self.duration_minutes)
    }

    /// True if the window has a positive length and ends by midnight UTC.
    ///
    /// Phases and keys are computed on `now`'s own date, so a window that
    /// ran past midnight would report `NotStarted` for its own tail.
    pub fn fits_in_day(&self) -> bool {
        let start_minutes = i64::from(self.start.num_seconds_from_midnight()) / 60;
        self.duration_minutes > 0 && start_minutes + self.duration_minutes <= 24 * 60
    }

    /// Where `now` falls relative to this session on its own date.
    pub fn phase_at(&self, now: DateTime<Utc>) -> SessionPhase {
        let date = now.date_naive();
        if now < self.start_on(date) {
            SessionPhase::NotStarted
        } else if now >= self.end_on(date) {
            SessionPhase::Ended
        } else {
            SessionPhase::Active
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    NotStarted,
    Active,
    Ended,
}

/// Key for a session foundation: one per asset, session and day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub asset: String,
    pub session: Session,
    pub date: NaiveDate,
}

impl SessionKey {
    pub fn new(asset: impl Into<String>, session: Session, date: NaiveDate) -> Self {
        Self {
            asset: asset.into(),
            session,
            date,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.asset, self.session, self.date)
    }
}

/// Key for a session trade counter. `asset` is `None` when the cap applies
/// across every asset traded in the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradeCountKey {
    pub asset: Option<String>,
    pub session: Session,
    pub date: NaiveDate,
}

impl fmt::Display for TradeCountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.asset {
            Some(asset) => write!(f, "{}:{}:{}", asset, self.session, self.date),
            None => write!(f, "*:{}:{}", self.session, self.date),
        }
    }
}
