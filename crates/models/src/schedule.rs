//! Calendar handling for game scheduling.
//!
//! Games are stored as a local calendar date (`YYYY-MM-DD`) plus a local
//! start time (`HH:MM`) in the server's configured timezone. Both columns
//! sort lexically in chronological order, so "is this game still ahead of
//! us" is a pair of string comparisons in SQL and the same comparison here.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;

use crate::{CourtId, Error, NewGame, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Wall-clock "now" in the server timezone, truncated to the minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Moment {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Moment {
    pub fn now_in(tz: Tz) -> Self {
        Self::from_naive(Utc::now().with_timezone(&tz).naive_local())
    }

    pub fn from_naive(at: NaiveDateTime) -> Self {
        Self {
            date: at.date(),
            time: truncate_to_minute(at.time()),
        }
    }

    pub fn date_key(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    pub fn time_key(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }
}

/// When a game starts, as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GameSlot {
    pub date: NaiveDate,
    pub start: NaiveTime,
}

impl GameSlot {
    pub fn parse(date: &str, start_time: &str, tz: Tz) -> Result<Self> {
        let date = parse_date(date)?;
        let start = parse_start_time(start_time, tz)?;
        Ok(Self { date, start })
    }

    pub fn date_key(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    pub fn time_key(&self) -> String {
        self.start.format(TIME_FORMAT).to_string()
    }

    /// A game on a later date is always ahead; a game today only while its
    /// start time hasn't been reached.
    pub fn is_after(&self, now: &Moment) -> bool {
        (self.date, self.start) > (now.date, now.time)
    }
}

/// Parse `YYYY-MM-DD` from its calendar components, so no timezone shift can
/// move it to a neighbouring day. A trailing `T...` time part is ignored.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let invalid = || Error::validation(format!("invalid date: {raw}"));
    let day_part = raw.trim().split('T').next().unwrap_or("");
    let mut parts = day_part.split('-');
    let (Some(y), Some(m), Some(d), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    if y.len() != 4 {
        return Err(invalid());
    }
    let year: i32 = y.parse().map_err(|_| invalid())?;
    let month: u32 = m.parse().map_err(|_| invalid())?;
    let day: u32 = d.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// `HH:MM` (or `HH:MM:SS`) is taken as local time on the game's date. Any
/// other form must be an ISO-8601 datetime; one with an offset is converted
/// into `tz` first. Only the time of day is kept.
pub fn parse_start_time(raw: &str, tz: Tz) -> Result<NaiveTime> {
    let raw = raw.trim();
    for fmt in ["%H:%M", "%H:%M:%S"] {
        if let Ok(t) = NaiveTime::parse_from_str(raw, fmt) {
            return Ok(truncate_to_minute(t));
        }
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(truncate_to_minute(at.with_timezone(&tz).time()));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(truncate_to_minute(at.time()));
        }
    }
    Err(Error::validation(format!("invalid start time: {raw}")))
}

fn truncate_to_minute(t: NaiveTime) -> NaiveTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// A `NewGame` that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct GameDraft {
    pub court_id: CourtId,
    pub slot: GameSlot,
    pub game_type: String,
    pub skill_level: String,
    pub players_needed: i64,
    pub notes: Option<String>,
}

impl NewGame {
    pub fn validate(&self, tz: Tz) -> Result<GameDraft> {
        let court_id = self.court_id.ok_or_else(|| Error::validation("court_id is required"))?;
        let date = required(&self.date, "date")?;
        let start_time = required(&self.start_time, "start_time")?;
        let game_type = required(&self.game_type, "game_type")?;
        let skill_level = required(&self.skill_level, "skill_level")?;
        let players_needed = self
            .players_needed
            .ok_or_else(|| Error::validation("players_needed is required"))?;
        if players_needed < 1 {
            return Err(Error::validation("players_needed must be at least 1"));
        }
        let slot = GameSlot::parse(date, start_time, tz)?;
        let notes = self
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(GameDraft {
            court_id,
            slot,
            game_type: game_type.to_string(),
            skill_level: skill_level.to_string(),
            players_needed,
            notes,
        })
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::validation(format!("{field} is required")))
}
