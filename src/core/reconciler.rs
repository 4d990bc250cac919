//! Reconciler: folds the remote change stream into the local interval store.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──resync ok──▶ Synced
//!       ▲                        │                      │ transport error
//!       └──── resync failed ─────┘                      ▼
//!       ◀──────────── recover failed ─────────────── Degraded
//!                                                      │ recover ok
//!                                                      └────▶ Synced
//! ```
//!
//! Convergence never depends on event ordering: events are full-record
//! upserts, and any gap is closed by a bulk resync rather than by replaying a
//! buffered log.

use crate::core::ports::{ChangeNotifier, IntervalFilter, Persistence, Subscription};
use crate::core::store::{IntervalStore, UpsertOutcome};
use crate::errors::{AppError, AppResult};
use crate::models::{ChangeEvent, ChangeKind, IntervalId};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Synced,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Store content changed.
    Changed,
    /// Duplicate or stale delivery; nothing to do.
    NoOp,
    /// Not synced; the next resync will account for it.
    Skipped,
}

#[derive(Debug)]
pub struct Reconciler {
    state: LinkState,
    window: IntervalFilter,
    last_resync: Option<DateTime<Utc>>,
    events_applied: u64,
}

impl Reconciler {
    pub fn new(window: IntervalFilter) -> Self {
        Self {
            state: LinkState::Disconnected,
            window,
            last_resync: None,
            events_applied: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn window(&self) -> &IntervalFilter {
        &self.window
    }

    pub fn last_resync(&self) -> Option<DateTime<Utc>> {
        self.last_resync
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied
    }

    /// Subscribe, then establish the baseline with a full fetch.
    ///
    /// The subscription is taken before the fetch so that nothing written in
    /// between can slip through; anything delivered twice is harmless.
    pub async fn connect<P, N>(
        &mut self,
        persistence: &P,
        notifier: &N,
        store: &mut IntervalStore,
        now: DateTime<Utc>,
    ) -> AppResult<Subscription>
    where
        P: Persistence,
        N: ChangeNotifier,
    {
        self.transition(LinkState::Connecting);

        let subscription = match notifier.subscribe() {
            Ok(sub) => sub,
            Err(e) => {
                self.transition(LinkState::Disconnected);
                return Err(e);
            }
        };

        match self.resync(persistence, store, now).await {
            Ok(_) => {
                self.transition(LinkState::Synced);
                Ok(subscription)
            }
            Err(e) => {
                self.transition(LinkState::Disconnected);
                Err(e)
            }
        }
    }

    /// Replace the visible window of `store` with the authoritative state.
    ///
    /// Returns the number of intervals fetched.
    pub async fn resync<P>(
        &mut self,
        persistence: &P,
        store: &mut IntervalStore,
        now: DateTime<Utc>,
    ) -> AppResult<usize>
    where
        P: Persistence,
    {
        let fetched = persistence.list_intervals(&self.window).await?;
        let count = fetched.len();

        let seen: HashSet<IntervalId> = fetched.iter().map(|iv| iv.id).collect();
        let mut changed = 0usize;
        for iv in fetched {
            match store.upsert(iv) {
                Ok(UpsertOutcome::Unchanged) => {}
                Ok(_) => changed += 1,
                Err(e) => warn!(error = %e, "skipping malformed interval during resync"),
            }
        }

        let window = &self.window;
        let dropped = store.retain_matching(|iv| !window.matches(iv) || seen.contains(&iv.id));

        self.last_resync = Some(now);
        info!(fetched = count, changed, dropped, "resync complete");
        Ok(count)
    }

    /// Apply one change event in arrival order.
    pub fn apply(&mut self, store: &mut IntervalStore, event: &ChangeEvent) -> AppResult<Applied> {
        if self.state != LinkState::Synced {
            debug!(state = ?self.state, interval = event.interval.id, "event skipped");
            return Ok(Applied::Skipped);
        }

        let applied = match event.kind {
            ChangeKind::Insert | ChangeKind::Update => match store.upsert(event.interval.clone())? {
                UpsertOutcome::Unchanged => Applied::NoOp,
                _ => Applied::Changed,
            },
            ChangeKind::Delete => match store.remove(event.interval.id) {
                Some(_) => Applied::Changed,
                None => Applied::NoOp,
            },
        };

        self.events_applied += 1;
        Ok(applied)
    }

    /// The change channel failed or closed.
    pub fn on_transport_error(&mut self, error: &AppError) {
        warn!(error = %error, "change feed lost");
        match self.state {
            LinkState::Synced => self.transition(LinkState::Degraded),
            LinkState::Connecting => self.transition(LinkState::Disconnected),
            LinkState::Degraded | LinkState::Disconnected => {}
        }
    }

    /// Leave `Degraded`: re-subscribe and resync, never replay.
    pub async fn recover<P, N>(
        &mut self,
        persistence: &P,
        notifier: &N,
        store: &mut IntervalStore,
        now: DateTime<Utc>,
    ) -> AppResult<Subscription>
    where
        P: Persistence,
        N: ChangeNotifier,
    {
        if self.state != LinkState::Degraded {
            return Err(AppError::Transport(format!(
                "cannot recover from state {:?}",
                self.state
            )));
        }

        let attempt = async {
            let subscription = notifier.subscribe()?;
            self.resync(persistence, store, now).await?;
            Ok::<_, AppError>(subscription)
        };

        match attempt.await {
            Ok(subscription) => {
                self.transition(LinkState::Synced);
                Ok(subscription)
            }
            Err(e) => {
                self.transition(LinkState::Disconnected);
                Err(e)
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.transition(LinkState::Disconnected);
    }

    fn transition(&mut self, next: LinkState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "link state");
            self.state = next;
        }
    }
}
