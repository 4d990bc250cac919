//! Punch engine: applies punch-in / punch-out intents to the local store.
//!
//! The local precondition check is a fast rejection only. The persistence
//! layer has the last word on "already on break", and its `Conflict` is
//! surfaced exactly like a locally detected one.

use crate::core::clock::Clock;
use crate::core::ports::Persistence;
use crate::core::store::IntervalStore;
use crate::errors::{AppError, AppResult};
use crate::models::{Interval, MemberId};
use tracing::{debug, info};

pub struct PunchEngine<'a, P, C> {
    persistence: &'a P,
    clock: &'a C,
}

impl<'a, P, C> PunchEngine<'a, P, C>
where
    P: Persistence,
    C: Clock,
{
    pub fn new(persistence: &'a P, clock: &'a C) -> Self {
        Self { persistence, clock }
    }

    /// Open a new interval for `member_id`.
    ///
    /// `Conflict` when the member already has an open interval, locally or
    /// according to persistence.
    pub async fn punch_in(
        &self,
        store: &mut IntervalStore,
        member_id: MemberId,
    ) -> AppResult<Interval> {
        if let Some(open) = store.open_interval_for(member_id) {
            debug!(member_id, open = open.id, "punch-in rejected locally");
            return Err(already_on_break(member_id));
        }

        let created = match self
            .persistence
            .create_interval(member_id, self.clock.now())
            .await
        {
            Ok(iv) => iv,
            Err(AppError::Conflict(_)) => return Err(already_on_break(member_id)),
            Err(e) => return Err(e),
        };

        // Optimistic local write; the echoed change event carries the same
        // record and replaces it with identical content.
        store.upsert(created.clone())?;
        info!(member_id, interval = created.id, "punched in");
        Ok(created)
    }

    /// Close the member's open interval.
    ///
    /// `NotFound` when there is nothing to close (double click, or someone
    /// else closed it first).
    pub async fn punch_out(
        &self,
        store: &mut IntervalStore,
        member_id: MemberId,
    ) -> AppResult<Interval> {
        let open = store
            .open_interval_for(member_id)
            .cloned()
            .ok_or_else(|| no_active_interval(member_id))?;

        let punch_out = self.clock.now().max(open.punch_in);

        let closed = match self.persistence.close_interval(open.id, punch_out).await {
            Ok(iv) => iv,
            Err(AppError::NotFound(_)) => return Err(no_active_interval(member_id)),
            Err(e) => return Err(e),
        };

        store.upsert(closed.clone())?;
        info!(member_id, interval = closed.id, "punched out");
        Ok(closed)
    }
}

fn already_on_break(member_id: MemberId) -> AppError {
    AppError::Conflict(format!("member {} is already on break", member_id))
}

fn no_active_interval(member_id: MemberId) -> AppError {
    AppError::NotFound(format!("no active interval for member {}", member_id))
}
