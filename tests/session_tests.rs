mod common;
use chrono::{DateTime, TimeDelta, Utc};
use common::{FEED_TIMEOUT, clock_start, memory_backend, session_on};
use rbreaktracker::core::{
    Applied, ChangeNotifier, IntervalFilter, LinkState, ManualClock, Persistence, ReportWindow,
    Session, SessionUpdate, Subscription, Ticker,
};
use rbreaktracker::db::SqliteBackend;
use rbreaktracker::errors::{AppError, AppResult};
use rbreaktracker::models::{
    ChangeEvent, ChangeKind, Interval, IntervalId, Member, MemberId, PresenceState,
};
use std::cell::{Cell, RefCell};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

#[derive(Default)]
struct ChannelNotifier {
    senders: RefCell<Vec<mpsc::Sender<ChangeEvent>>>,
}

impl ChangeNotifier for ChannelNotifier {
    fn subscribe(&self) -> AppResult<Subscription> {
        let (tx, rx) = mpsc::channel(16);
        self.senders.borrow_mut().push(tx);
        Ok(Subscription::from_channel(rx))
    }
}

/// Persistence whose listings fail a set number of times.
struct FlakyPersistence {
    inner: SqliteBackend,
    failures_left: Cell<u32>,
}

impl Persistence for FlakyPersistence {
    async fn create_interval(
        &self,
        member_id: MemberId,
        punch_in: DateTime<Utc>,
    ) -> AppResult<Interval> {
        self.inner.create_interval(member_id, punch_in).await
    }

    async fn close_interval(
        &self,
        id: IntervalId,
        punch_out: DateTime<Utc>,
    ) -> AppResult<Interval> {
        self.inner.close_interval(id, punch_out).await
    }

    async fn list_intervals(&self, filter: &IntervalFilter) -> AppResult<Vec<Interval>> {
        let left = self.failures_left.get();
        if left > 0 {
            self.failures_left.set(left - 1);
            return Err(AppError::Transport("connection reset".into()));
        }
        self.inner.list_intervals(filter).await
    }

    async fn list_members(&self) -> AppResult<Vec<Member>> {
        self.inner.list_members().await
    }
}

async fn next_change(session: &mut common::TestSession) -> (ChangeEvent, Applied) {
    loop {
        let update = timeout(FEED_TIMEOUT, session.next_update())
            .await
            .expect("change delivered in time")
            .unwrap();
        if let SessionUpdate::Change { event, applied } = update {
            return (event, applied);
        }
    }
}

#[tokio::test]
async fn test_two_sessions_converge() {
    let backend = memory_backend();
    let alice = backend.add_member("Alice", Some("alice@example.com"), false).unwrap();
    let clock = ManualClock::new(clock_start());

    let mut desk = session_on(&backend, &clock);
    let mut wall = session_on(&backend, &clock);
    desk.open().await.unwrap();
    wall.open().await.unwrap();

    let opened = desk.punch_in(alice.id).await.unwrap();
    let (event, applied) = next_change(&mut wall).await;
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.interval.id, opened.id);
    assert_eq!(applied, Applied::Changed);
    assert_eq!(wall.presence_of(alice.id), PresenceState::OnBreak);

    clock.advance(TimeDelta::minutes(10));
    desk.punch_out(alice.id).await.unwrap();
    let (event, _) = next_change(&mut wall).await;
    assert_eq!(event.kind, ChangeKind::Update);
    assert_eq!(wall.presence_of(alice.id), PresenceState::Available);

    let desk_view: Vec<_> = desk.store().all().into_iter().cloned().collect();
    let wall_view: Vec<_> = wall.store().all().into_iter().cloned().collect();
    assert_eq!(desk_view, wall_view);
}

#[tokio::test]
async fn test_removing_member_closes_open_interval_everywhere() {
    let backend = memory_backend();
    let alice = backend.add_member("Alice", None, false).unwrap();
    let clock = ManualClock::new(clock_start());

    let mut session = session_on(&backend, &clock);
    session.open().await.unwrap();
    let opened = session.punch_in(alice.id).await.unwrap();
    // own echo
    next_change(&mut session).await;

    backend
        .remove_member(alice.id, clock_start() + TimeDelta::minutes(3))
        .unwrap();

    let (event, applied) = next_change(&mut session).await;
    assert_eq!(event.kind, ChangeKind::Update);
    assert_eq!(applied, Applied::Changed);
    let closed = session.store().get(opened.id).unwrap();
    assert_eq!(closed.punch_out, Some(clock_start() + TimeDelta::minutes(3)));
    assert_eq!(closed.member_name.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn test_lost_feed_is_recovered_by_resync() {
    let backend = memory_backend();
    let alice = backend.add_member("Alice", None, false).unwrap();
    let clock = ManualClock::new(clock_start());
    let notifier = ChannelNotifier::default();

    let mut session = Session::new(
        backend.clone(),
        notifier,
        clock.clone(),
        IntervalFilter::visible_since(clock_start() - TimeDelta::days(1)),
    );
    session.open().await.unwrap();

    // someone else punches in; this notifier never forwards it
    let elsewhere = backend.create_interval(alice.id, clock_start()).await.unwrap();
    assert!(session.store().get(elsewhere.id).is_none());

    // the only sender goes away: the feed closes
    drop_senders(&session);
    let update = timeout(FEED_TIMEOUT, session.next_update()).await.unwrap().unwrap();
    assert_eq!(update, SessionUpdate::FeedLost);
    assert_eq!(session.state(), LinkState::Degraded);

    let update = timeout(FEED_TIMEOUT, session.next_update()).await.unwrap().unwrap();
    assert_eq!(update, SessionUpdate::Resynced(1));
    assert_eq!(session.state(), LinkState::Synced);
    assert_eq!(session.store().get(elsewhere.id), Some(&elsewhere));
}

fn drop_senders<P: Persistence>(session: &Session<P, ChannelNotifier, ManualClock>) {
    session.notifier().senders.borrow_mut().clear();
}

fn flaky_session(
    backend: &SqliteBackend,
    clock: &ManualClock,
) -> Session<FlakyPersistence, ChannelNotifier, ManualClock> {
    let persistence = FlakyPersistence {
        inner: backend.clone(),
        failures_left: Cell::new(0),
    };
    Session::new(
        persistence,
        ChannelNotifier::default(),
        clock.clone(),
        IntervalFilter::visible_since(clock_start() - TimeDelta::days(1)),
    )
    .with_retry_delay(Duration::from_millis(10))
}

#[tokio::test]
async fn test_failed_recovery_is_retried_until_synced() {
    let backend = memory_backend();
    let alice = backend.add_member("Alice", None, false).unwrap();
    let clock = ManualClock::new(clock_start());
    let mut session = flaky_session(&backend, &clock);
    session.open().await.unwrap();

    let missed = backend.create_interval(alice.id, clock_start()).await.unwrap();
    session.persistence().failures_left.set(2);
    drop_senders(&session);

    let update = timeout(FEED_TIMEOUT, session.next_update()).await.unwrap().unwrap();
    assert_eq!(update, SessionUpdate::FeedLost);

    let update = timeout(FEED_TIMEOUT, session.next_update()).await.unwrap().unwrap();
    assert!(matches!(
        update,
        SessionUpdate::RecoveryFailed { retry_in, .. } if retry_in == Duration::from_millis(10)
    ));
    assert_eq!(session.state(), LinkState::Disconnected);

    // backoff doubles on a repeated failure
    let update = timeout(FEED_TIMEOUT, session.next_update()).await.unwrap().unwrap();
    assert!(matches!(
        update,
        SessionUpdate::RecoveryFailed { retry_in, .. } if retry_in == Duration::from_millis(20)
    ));

    let update = timeout(FEED_TIMEOUT, session.next_update()).await.unwrap().unwrap();
    assert_eq!(update, SessionUpdate::Resynced(1));
    assert_eq!(session.state(), LinkState::Synced);
    assert_eq!(session.store().get(missed.id), Some(&missed));

    // the fresh subscription delivers again
    let event = ChangeEvent::insert(missed.clone());
    session
        .notifier()
        .senders
        .borrow()
        .last()
        .unwrap()
        .try_send(event)
        .unwrap();
    let update = timeout(FEED_TIMEOUT, session.next_update()).await.unwrap().unwrap();
    assert!(matches!(
        update,
        SessionUpdate::Change {
            applied: Applied::NoOp,
            ..
        }
    ));
}

#[tokio::test]
async fn test_close_cancels_pending_reconnect() {
    let backend = memory_backend();
    let clock = ManualClock::new(clock_start());
    let mut session = flaky_session(&backend, &clock);
    session.open().await.unwrap();

    session.persistence().failures_left.set(1);
    drop_senders(&session);
    session.next_update().await.unwrap();
    let update = session.next_update().await.unwrap();
    assert!(matches!(update, SessionUpdate::RecoveryFailed { .. }));

    session.close();
    assert_eq!(session.next_update().await.unwrap(), SessionUpdate::Closed);
}

#[tokio::test]
async fn test_ticks_are_delivered_and_close_stops_everything() {
    let backend = memory_backend();
    let clock = ManualClock::new(clock_start());
    let mut session = session_on(&backend, &clock);
    session.open().await.unwrap();
    session.start_ticker(Duration::from_millis(20));

    let update = timeout(FEED_TIMEOUT, session.next_update()).await.unwrap().unwrap();
    assert_eq!(update, SessionUpdate::Tick(clock_start()));

    clock.advance(TimeDelta::seconds(1));
    let update = timeout(FEED_TIMEOUT, session.next_update()).await.unwrap().unwrap();
    assert_eq!(update, SessionUpdate::Tick(clock_start() + TimeDelta::seconds(1)));

    session.close();
    assert_eq!(session.state(), LinkState::Disconnected);
    let update = session.next_update().await.unwrap();
    assert_eq!(update, SessionUpdate::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_ticker_cancel_stops_ticks() {
    let mut ticker = Ticker::start(Duration::from_secs(1));

    assert_eq!(ticker.next().await, Some(()));
    assert_eq!(ticker.next().await, Some(()));

    assert!(!ticker.is_cancelled());
    ticker.cancel();
    assert!(ticker.is_cancelled());

    // at most one buffered tick survives the cancel
    let mut drained = 0;
    while ticker.next().await.is_some() {
        drained += 1;
    }
    assert!(drained <= 1);
}

#[tokio::test]
async fn test_report_uses_store_or_fetches_outside_window() {
    let backend = memory_backend();
    let alice = backend.add_member("Alice", None, false).unwrap();
    let clock = ManualClock::new(clock_start());
    let mut session = session_on(&backend, &clock);
    session.open().await.unwrap();

    session.punch_in(alice.id).await.unwrap();
    clock.advance(TimeDelta::minutes(15));
    session.punch_out(alice.id).await.unwrap();

    let day = ReportWindow::new(
        clock_start() - TimeDelta::hours(9),
        clock_start() + TimeDelta::hours(15),
    )
    .unwrap();
    let rows = session.report(&day).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Alice");
    assert_eq!(rows[0].duration, TimeDelta::minutes(15));

    // starts before the synced window: served by a fetch
    let wide = ReportWindow::new(
        clock_start() - TimeDelta::days(365),
        clock_start() + TimeDelta::days(1),
    )
    .unwrap();
    let fetched = session.report(&wide).await.unwrap();
    assert_eq!(fetched, rows);
}
