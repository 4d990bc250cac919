//! Duration clock: live elapsed time for intervals, computed at read time.
//!
//! The reference instant is always supplied by the caller (a tick, an export
//! time, ...). Nothing in here reads the wall clock except [`SystemClock`].

use crate::models::Interval;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex};

/// Source of "now" for punch operations.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = at;
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Elapsed time of `interval` as seen at `reference`.
///
/// - closed: `punch_out - punch_in`, whatever the reference
/// - open:   `reference - punch_in`, clamped at zero
pub fn elapsed(interval: &Interval, reference: DateTime<Utc>) -> TimeDelta {
    let end = interval.punch_out.unwrap_or(reference);
    (end - interval.punch_in).max(TimeDelta::zero())
}

/// `HH:MM:SS`; hours are not wrapped at 24.
pub fn format_hms(d: TimeDelta) -> String {
    let secs = d.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// `Xh Ym` (e.g. `1h 5m`, `0h 0m`).
pub fn format_hm(d: TimeDelta) -> String {
    let mins = d.num_minutes().max(0);
    format!("{}h {}m", mins / 60, mins % 60)
}
