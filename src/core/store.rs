//! Interval store: the client-local, single writable copy of attendance
//! intervals.
//!
//! Writes are full-record replacements keyed by interval id, which makes
//! every write idempotent and insensitive to delivery order.

use crate::errors::{AppError, AppResult};
use crate::models::{Interval, IntervalId, MemberId, PresenceState};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    Unchanged,
}

#[derive(Debug, Default, Clone)]
pub struct IntervalStore {
    entries: BTreeMap<IntervalId, Interval>,
}

impl IntervalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, or replace the entry with the same id.
    ///
    /// Rejects records whose punch-out precedes their punch-in (store left
    /// untouched).
    pub fn upsert(&mut self, interval: Interval) -> AppResult<UpsertOutcome> {
        if !interval.is_well_formed() {
            return Err(AppError::Validation(format!(
                "interval {} ends before it starts",
                interval.id
            )));
        }

        if interval.is_open()
            && let Some(other) = self.entries.values().find(|iv| {
                iv.member_id == interval.member_id && iv.is_open() && iv.id != interval.id
            })
        {
            warn!(
                member_id = interval.member_id,
                existing = other.id,
                incoming = interval.id,
                "more than one open interval for member"
            );
        }

        let outcome = match self.entries.get(&interval.id) {
            None => UpsertOutcome::Inserted,
            Some(current) if *current == interval => return Ok(UpsertOutcome::Unchanged),
            Some(_) => UpsertOutcome::Replaced,
        };
        self.entries.insert(interval.id, interval);
        Ok(outcome)
    }

    /// Idempotent: removing an unknown id is a no-op.
    pub fn remove(&mut self, id: IntervalId) -> Option<Interval> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: IntervalId) -> Option<&Interval> {
        self.entries.get(&id)
    }

    /// The open interval of `member_id`, if any.
    ///
    /// Should duplicates exist, the one with the latest punch-in wins and the
    /// inconsistency is logged; the caller never sees an error.
    pub fn open_interval_for(&self, member_id: MemberId) -> Option<&Interval> {
        let mut open = self
            .entries
            .values()
            .filter(|iv| iv.member_id == member_id && iv.is_open());

        let first = open.next()?;
        let mut duplicates = 0usize;
        let latest = open.fold(first, |best, iv| {
            duplicates += 1;
            if (iv.punch_in, iv.id) > (best.punch_in, best.id) {
                iv
            } else {
                best
            }
        });

        if duplicates > 0 {
            warn!(
                member_id,
                open = duplicates + 1,
                chosen = latest.id,
                "inconsistent store: several open intervals for member"
            );
        }
        Some(latest)
    }

    pub fn presence_of(&self, member_id: MemberId) -> PresenceState {
        if self.open_interval_for(member_id).is_some() {
            PresenceState::OnBreak
        } else {
            PresenceState::Available
        }
    }

    /// All intervals ordered by punch-in ascending, ties by id.
    pub fn all(&self) -> Vec<&Interval> {
        let mut out: Vec<&Interval> = self.entries.values().collect();
        out.sort_by_key(|iv| (iv.punch_in, iv.id));
        out
    }

    pub fn open_intervals(&self) -> Vec<&Interval> {
        self.all().into_iter().filter(|iv| iv.is_open()).collect()
    }

    /// Drop every entry for which `keep` returns false; returns how many went.
    pub fn retain_matching<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Interval) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|_, iv| keep(iv));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
