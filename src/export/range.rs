// src/export/range.rs

use crate::core::report::ReportWindow;
use crate::errors::{AppError, AppResult};
use crate::utils::date::{month_last_day, parse_date};
use crate::utils::zone::DisplayZone;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

/// Parse a `--range` expression into inclusive calendar bounds.
///
/// Supports:
/// - YYYY
/// - YYYY-MM
/// - YYYY-MM-DD
/// - YYYY:YYYY
/// - YYYY-MM:YYYY-MM
/// - YYYY-MM-DD:YYYY-MM-DD
pub fn parse_range(r: &str) -> AppResult<(NaiveDate, NaiveDate)> {
    let (start, end) = match r.split_once(':') {
        Some((s, e)) => (s.trim(), e.trim()),
        None => (r.trim(), r.trim()),
    };

    if start.len() != end.len() {
        return Err(AppError::InvalidDate(format!(
            "range '{}': start and end must have same format",
            r
        )));
    }

    let (d1, _) = period_bounds(start)?;
    let (_, d2) = period_bounds(end)?;

    if d2 < d1 {
        return Err(AppError::InvalidDate(format!(
            "range '{}': end precedes start",
            r
        )));
    }
    Ok((d1, d2))
}

/// First and last day of a single `YYYY`, `YYYY-MM` or `YYYY-MM-DD` period.
fn period_bounds(p: &str) -> AppResult<(NaiveDate, NaiveDate)> {
    let invalid = || AppError::InvalidDate(p.to_string());

    match p.len() {
        4 => {
            let y: i32 = p.parse().map_err(|_| invalid())?;
            let d1 = NaiveDate::from_ymd_opt(y, 1, 1).ok_or_else(invalid)?;
            let d2 = NaiveDate::from_ymd_opt(y, 12, 31).ok_or_else(invalid)?;
            Ok((d1, d2))
        }
        7 => {
            let (ys, ms) = p.split_once('-').ok_or_else(invalid)?;
            let y: i32 = ys.parse().map_err(|_| invalid())?;
            let m: u32 = ms.parse().map_err(|_| invalid())?;
            let last = month_last_day(y, m).ok_or_else(invalid)?;
            let d1 = NaiveDate::from_ymd_opt(y, m, 1).ok_or_else(invalid)?;
            let d2 = NaiveDate::from_ymd_opt(y, m, last).ok_or_else(invalid)?;
            Ok((d1, d2))
        }
        10 => {
            let d = parse_date(p).ok_or_else(invalid)?;
            Ok((d, d))
        }
        _ => Err(AppError::InvalidDate(format!(
            "unsupported range format '{}'",
            p
        ))),
    }
}

/// Report window for a `--range` value.
///
/// Calendar days are interpreted in `zone`; the inclusive day range
/// `[d1, d2]` becomes `[d1 00:00, (d2 + 1) 00:00)`. `None` means today,
/// `all` means everything punched in up to `now`.
pub fn window_for(
    range: Option<&str>,
    zone: &DisplayZone,
    now: DateTime<Utc>,
) -> AppResult<ReportWindow> {
    let (d1, d2) = match range {
        Some(r) if r.eq_ignore_ascii_case("all") => {
            return ReportWindow::new(DateTime::<Utc>::UNIX_EPOCH, now + TimeDelta::seconds(1));
        }
        Some(r) => parse_range(r)?,
        None => {
            let today = zone.date_of(now);
            (today, today)
        }
    };

    let next_day = d2
        .succ_opt()
        .ok_or_else(|| AppError::InvalidDate(d2.to_string()))?;
    ReportWindow::new(zone.start_of_day(d1)?, zone.start_of_day(next_day)?)
}
