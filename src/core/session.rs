//! Per-connection session: one interval store, one reconciler, one change
//! subscription and an optional ticker, created together and torn down
//! together.

use crate::core::clock::{Clock, elapsed};
use crate::core::ports::{ChangeNotifier, IntervalFilter, Persistence, Subscription};
use crate::core::punch::PunchEngine;
use crate::core::reconciler::{Applied, LinkState, Reconciler};
use crate::core::report::{ReportBuilder, ReportRow, ReportWindow};
use crate::core::store::IntervalStore;
use crate::core::ticker::Ticker;
use crate::errors::{AppError, AppResult};
use crate::models::{ChangeEvent, Interval, MemberId, PresenceState};
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Change { event: ChangeEvent, applied: Applied },
    Tick(DateTime<Utc>),
    /// The change feed dropped; the next call recovers.
    FeedLost,
    /// Recovered from a lost feed; carries the number of intervals fetched.
    Resynced(usize),
    /// Reconnect failed; the next call retries after `retry_in`.
    RecoveryFailed { error: String, retry_in: Duration },
    Closed,
}

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

enum Wake {
    Event(Option<ChangeEvent>),
    Tick(Option<()>),
}

/// Dropping a session releases its subscription and cancels its ticker.
pub struct Session<P, N, C> {
    persistence: P,
    notifier: N,
    clock: C,
    store: IntervalStore,
    reconciler: Reconciler,
    subscription: Option<Subscription>,
    ticker: Option<Ticker>,
    retry_delay: Duration,
    /// Pending reconnect after a failed recovery.
    reconnect_in: Option<Duration>,
}

impl<P, N, C> Session<P, N, C>
where
    P: Persistence,
    N: ChangeNotifier,
    C: Clock,
{
    pub fn new(persistence: P, notifier: N, clock: C, window: IntervalFilter) -> Self {
        Self {
            persistence,
            notifier,
            clock,
            store: IntervalStore::new(),
            reconciler: Reconciler::new(window),
            subscription: None,
            ticker: None,
            retry_delay: DEFAULT_RETRY_DELAY,
            reconnect_in: None,
        }
    }

    /// First delay before reconnecting after a failed recovery; doubles on
    /// each further failure up to 30s.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub async fn open(&mut self) -> AppResult<()> {
        let now = self.clock.now();
        let subscription = self
            .reconciler
            .connect(&self.persistence, &self.notifier, &mut self.store, now)
            .await?;
        self.subscription = Some(subscription);
        Ok(())
    }

    pub fn state(&self) -> LinkState {
        self.reconciler.state()
    }

    pub fn store(&self) -> &IntervalStore {
        &self.store
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn punch_in(&mut self, member_id: MemberId) -> AppResult<Interval> {
        PunchEngine::new(&self.persistence, &self.clock)
            .punch_in(&mut self.store, member_id)
            .await
    }

    pub async fn punch_out(&mut self, member_id: MemberId) -> AppResult<Interval> {
        PunchEngine::new(&self.persistence, &self.clock)
            .punch_out(&mut self.store, member_id)
            .await
    }

    pub fn open_interval_for(&self, member_id: MemberId) -> Option<&Interval> {
        self.store.open_interval_for(member_id)
    }

    pub fn presence_of(&self, member_id: MemberId) -> PresenceState {
        self.store.presence_of(member_id)
    }

    /// Live duration of the member's open interval at `at`.
    pub fn elapsed_for(&self, member_id: MemberId, at: DateTime<Utc>) -> Option<TimeDelta> {
        self.store
            .open_interval_for(member_id)
            .map(|iv| elapsed(iv, at))
    }

    /// Report over `window`. Served from the local store when the window
    /// lies inside what the session keeps synced, fetched otherwise.
    pub async fn report(&self, window: &ReportWindow) -> AppResult<Vec<ReportRow>> {
        let members = self.persistence.list_members().await?;
        let now = Some(self.clock.now());

        let local = self.reconciler.state() == LinkState::Synced
            && self
                .reconciler
                .window()
                .since
                .is_none_or(|since| window.start >= since);

        if local {
            Ok(ReportBuilder::build(window, &members, self.store.all(), now))
        } else {
            let filter = IntervalFilter::punched_in_between(window.start, window.end);
            let fetched = self.persistence.list_intervals(&filter).await?;
            Ok(ReportBuilder::build(window, &members, &fetched, now))
        }
    }

    pub fn start_ticker(&mut self, period: Duration) {
        self.ticker = Some(Ticker::start(period));
    }

    /// Wait for the next change event or tick and fold it in.
    pub async fn next_update(&mut self) -> AppResult<SessionUpdate> {
        loop {
            match self.reconciler.state() {
                LinkState::Synced => {}
                LinkState::Degraded => return self.recover().await,
                LinkState::Disconnected | LinkState::Connecting => {
                    return match self.reconnect_in {
                        Some(delay) => self.reconnect(delay).await,
                        None => Ok(SessionUpdate::Closed),
                    };
                }
            }

            let Some(subscription) = self.subscription.as_mut() else {
                return Ok(SessionUpdate::Closed);
            };

            let wake = tokio::select! {
                event = subscription.recv() => Wake::Event(event),
                tick = next_tick(self.ticker.as_mut()) => Wake::Tick(tick),
            };

            match wake {
                Wake::Event(Some(event)) => {
                    let applied = self.reconciler.apply(&mut self.store, &event)?;
                    return Ok(SessionUpdate::Change { event, applied });
                }
                Wake::Event(None) => {
                    self.subscription = None;
                    self.reconciler
                        .on_transport_error(&AppError::Transport("change feed closed".into()));
                    return Ok(SessionUpdate::FeedLost);
                }
                Wake::Tick(Some(())) => return Ok(SessionUpdate::Tick(self.clock.now())),
                Wake::Tick(None) => {
                    debug!("ticker stopped");
                    self.ticker = None;
                }
            }
        }
    }

    async fn recover(&mut self) -> AppResult<SessionUpdate> {
        let now = self.clock.now();
        let result = self
            .reconciler
            .recover(&self.persistence, &self.notifier, &mut self.store, now)
            .await;
        Ok(self.settle(result, self.retry_delay))
    }

    async fn reconnect(&mut self, delay: Duration) -> AppResult<SessionUpdate> {
        tokio::time::sleep(delay).await;
        let now = self.clock.now();
        let result = self
            .reconciler
            .connect(&self.persistence, &self.notifier, &mut self.store, now)
            .await;
        Ok(self.settle(result, (delay * 2).min(MAX_RETRY_DELAY)))
    }

    fn settle(&mut self, result: AppResult<Subscription>, next_delay: Duration) -> SessionUpdate {
        match result {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.reconnect_in = None;
                SessionUpdate::Resynced(self.store.len())
            }
            Err(e) => {
                warn!(error = %e, retry_in = ?next_delay, "recovery failed");
                self.subscription = None;
                self.reconnect_in = Some(next_delay);
                SessionUpdate::RecoveryFailed {
                    error: e.to_string(),
                    retry_in: next_delay,
                }
            }
        }
    }

    /// Unsubscribe and stop the ticker.
    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.reconnect_in = None;
        self.reconciler.disconnect();
    }
}

async fn next_tick(ticker: Option<&mut Ticker>) -> Option<()> {
    match ticker {
        Some(t) => t.next().await,
        None => std::future::pending().await,
    }
}
