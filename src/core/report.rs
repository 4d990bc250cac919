//! Report builder: windowed, ordered join of intervals with member identity.

use crate::core::clock::elapsed;
use crate::errors::{AppError, AppResult};
use crate::models::{Interval, IntervalId, Member, MemberId};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;

/// Half-open window `[start, end)` on punch-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Self> {
        if start >= end {
            return Err(AppError::Validation(format!(
                "report window start {} is not before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub interval_id: IntervalId,
    pub member_id: MemberId,
    pub name: String,
    pub email: String,
    pub punch_in: DateTime<Utc>,
    pub punch_out: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub duration: TimeDelta,
}

pub struct ReportBuilder;

impl ReportBuilder {
    /// Rows for every interval punched in inside `window`, ordered by
    /// punch-in then interval id.
    ///
    /// Open intervals are measured up to `now` when it falls before the
    /// window end, otherwise up to the window end. Rows of removed members
    /// fall back to the identity captured on the interval, or to empty
    /// fields; they are never dropped.
    pub fn build<'a, I>(
        window: &ReportWindow,
        members: &[Member],
        intervals: I,
        now: Option<DateTime<Utc>>,
    ) -> Vec<ReportRow>
    where
        I: IntoIterator<Item = &'a Interval>,
    {
        let by_id: HashMap<MemberId, &Member> = members.iter().map(|m| (m.id, m)).collect();

        let reference = match now {
            Some(n) if n < window.end => n,
            _ => window.end,
        };

        let mut rows: Vec<ReportRow> = intervals
            .into_iter()
            .filter(|iv| window.contains(iv.punch_in))
            .map(|iv| {
                let (name, email) = match by_id.get(&iv.member_id) {
                    Some(m) => (m.name.clone(), m.email_str().to_string()),
                    None => (
                        iv.member_name.clone().unwrap_or_default(),
                        iv.member_email.clone().unwrap_or_default(),
                    ),
                };
                ReportRow {
                    interval_id: iv.id,
                    member_id: iv.member_id,
                    name,
                    email,
                    punch_in: iv.punch_in,
                    punch_out: iv.punch_out,
                    created_at: iv.created_at,
                    duration: elapsed(iv, reference),
                }
            })
            .collect();

        rows.sort_by_key(|r| (r.punch_in, r.interval_id));
        rows
    }
}
