//! The single configured display timezone.

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, TimeDelta, TimeZone, Utc};

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayZone {
    Local,
    Fixed(FixedOffset),
}

impl DisplayZone {
    /// Accepts `local`, `UTC` / `Z`, or an offset such as `+02:00`, `-0530`.
    pub fn parse(s: &str) -> AppResult<Self> {
        let raw = s.trim();
        match raw.to_ascii_lowercase().as_str() {
            "local" => return Ok(DisplayZone::Local),
            "utc" | "z" => return Ok(DisplayZone::utc()),
            _ => {}
        }

        let invalid = || AppError::Config(format!("invalid display timezone '{}'", s));

        let (sign, rest) = match raw.as_bytes().first() {
            Some(b'+') => (1, &raw[1..]),
            Some(b'-') => (-1, &raw[1..]),
            _ => return Err(invalid()),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: i32 = digits[0..2].parse().map_err(|_| invalid())?;
        let minutes: i32 = digits[2..4].parse().map_err(|_| invalid())?;
        if minutes >= 60 {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(DisplayZone::Fixed)
            .ok_or_else(invalid)
    }

    pub fn utc() -> Self {
        DisplayZone::Fixed(Utc.fix())
    }

    /// `DD/MM/YYYY HH:mm` in this zone.
    pub fn format_timestamp(&self, t: DateTime<Utc>) -> String {
        self.format(t, TIMESTAMP_FORMAT)
    }

    pub fn format(&self, t: DateTime<Utc>, fmt: &str) -> String {
        match self {
            DisplayZone::Local => t.with_timezone(&Local).format(fmt).to_string(),
            DisplayZone::Fixed(offset) => t.with_timezone(offset).format(fmt).to_string(),
        }
    }

    /// Calendar date of `t` in this zone.
    pub fn date_of(&self, t: DateTime<Utc>) -> NaiveDate {
        match self {
            DisplayZone::Local => t.with_timezone(&Local).date_naive(),
            DisplayZone::Fixed(offset) => t.with_timezone(offset).date_naive(),
        }
    }

    /// First instant of `date`, as a UTC instant.
    ///
    /// Normally midnight; when a DST change skips midnight, the first local
    /// time that exists that day.
    pub fn start_of_day(&self, date: NaiveDate) -> AppResult<DateTime<Utc>> {
        let resolved = match self {
            DisplayZone::Local => first_instant(&Local, date),
            DisplayZone::Fixed(offset) => first_instant(offset, date),
        };
        resolved.ok_or_else(|| AppError::InvalidDate(format!("{} has no valid start", date)))
    }
}

fn first_instant<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    // DST gaps are at most a few hours long and start on a quarter hour
    (0..=4 * 4)
        .map(|quarter| midnight + TimeDelta::minutes(15 * quarter))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|t| t.with_timezone(&Utc))
}
