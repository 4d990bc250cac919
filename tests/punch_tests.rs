mod common;
use chrono::TimeDelta;
use common::{FEED_TIMEOUT, clock_start, memory_backend, session_on};
use rbreaktracker::core::{Applied, LinkState, ManualClock, SessionUpdate, format_hms};
use rbreaktracker::errors::AppError;
use rbreaktracker::models::PresenceState;
use tokio::time::timeout;

#[tokio::test]
async fn test_punch_in_then_out_follows_injected_clock() {
    let backend = memory_backend();
    let alice = backend.add_member("Alice", None, false).unwrap();
    let clock = ManualClock::new(clock_start());
    let mut session = session_on(&backend, &clock);
    session.open().await.unwrap();
    assert_eq!(session.state(), LinkState::Synced);

    let opened = session.punch_in(alice.id).await.unwrap();
    assert_eq!(opened.punch_in, clock_start());
    assert!(opened.punch_out.is_none());
    assert_eq!(session.presence_of(alice.id), PresenceState::OnBreak);

    clock.advance(TimeDelta::seconds(65));
    let live = session.elapsed_for(alice.id, session.now()).unwrap();
    assert_eq!(format_hms(live), "00:01:05");

    clock.advance(TimeDelta::seconds(65));
    let closed = session.punch_out(alice.id).await.unwrap();
    assert_eq!(closed.id, opened.id);
    assert_eq!(closed.punch_out, Some(clock_start() + TimeDelta::seconds(130)));
    assert_eq!(session.presence_of(alice.id), PresenceState::Available);
    assert!(session.elapsed_for(alice.id, session.now()).is_none());

    let stored = session.store().get(opened.id).unwrap();
    assert_eq!(stored.punch_out, closed.punch_out);
}

#[tokio::test]
async fn test_double_punch_in_is_conflict() {
    let backend = memory_backend();
    let alice = backend.add_member("Alice", None, false).unwrap();
    let clock = ManualClock::new(clock_start());
    let mut session = session_on(&backend, &clock);
    session.open().await.unwrap();

    session.punch_in(alice.id).await.unwrap();
    let err = session.punch_in(alice.id).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert!(err.to_string().contains("already on break"));
    assert_eq!(session.store().open_intervals().len(), 1);
}

#[tokio::test]
async fn test_punch_out_without_open_interval_is_not_found() {
    let backend = memory_backend();
    let alice = backend.add_member("Alice", None, false).unwrap();
    let clock = ManualClock::new(clock_start());
    let mut session = session_on(&backend, &clock);
    session.open().await.unwrap();

    let err = session.punch_out(alice.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(session.store().is_empty());

    session.punch_in(alice.id).await.unwrap();
    session.punch_out(alice.id).await.unwrap();

    let err = session.punch_out(alice.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(err.to_string().contains("no active interval"));
    assert_eq!(session.store().len(), 1);
}

#[tokio::test]
async fn test_punch_in_unknown_member_is_not_found() {
    let backend = memory_backend();
    let clock = ManualClock::new(clock_start());
    let mut session = session_on(&backend, &clock);
    session.open().await.unwrap();

    let err = session.punch_in(99).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(session.store().is_empty());
}

#[tokio::test]
async fn test_stale_session_punch_in_rejected_by_persistence() {
    let backend = memory_backend();
    let alice = backend.add_member("Alice", None, false).unwrap();
    let clock = ManualClock::new(clock_start());

    let mut first = session_on(&backend, &clock);
    let mut second = session_on(&backend, &clock);
    first.open().await.unwrap();
    second.open().await.unwrap();

    first.punch_in(alice.id).await.unwrap();

    // `second` has not seen the insert yet, so only persistence can refuse.
    assert!(second.open_interval_for(alice.id).is_none());
    let err = second.punch_in(alice.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(err.to_string().contains("already on break"));

    let update = timeout(FEED_TIMEOUT, second.next_update())
        .await
        .expect("insert delivered")
        .unwrap();
    assert!(matches!(
        update,
        SessionUpdate::Change {
            applied: Applied::Changed,
            ..
        }
    ));
    assert_eq!(second.presence_of(alice.id), PresenceState::OnBreak);
}

#[tokio::test]
async fn test_stale_session_punch_out_after_remote_close_is_not_found() {
    let backend = memory_backend();
    let alice = backend.add_member("Alice", None, false).unwrap();
    let clock = ManualClock::new(clock_start());

    let mut first = session_on(&backend, &clock);
    first.open().await.unwrap();
    first.punch_in(alice.id).await.unwrap();

    let mut second = session_on(&backend, &clock);
    second.open().await.unwrap();
    assert_eq!(second.presence_of(alice.id), PresenceState::OnBreak);

    clock.advance(TimeDelta::minutes(5));
    first.punch_out(alice.id).await.unwrap();

    let err = second.punch_out(alice.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_own_echo_is_noop() {
    let backend = memory_backend();
    let alice = backend.add_member("Alice", None, false).unwrap();
    let clock = ManualClock::new(clock_start());
    let mut session = session_on(&backend, &clock);
    session.open().await.unwrap();

    session.punch_in(alice.id).await.unwrap();
    let before: Vec<_> = session.store().all().into_iter().cloned().collect();

    let update = timeout(FEED_TIMEOUT, session.next_update())
        .await
        .expect("echo delivered")
        .unwrap();
    assert!(matches!(
        update,
        SessionUpdate::Change {
            applied: Applied::NoOp,
            ..
        }
    ));

    let after: Vec<_> = session.store().all().into_iter().cloned().collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_interleaved_sessions_never_hold_two_open_intervals() {
    let backend = memory_backend();
    let members: Vec<_> = ["Alice", "Bob", "Carol"]
        .iter()
        .map(|n| backend.add_member(n, None, false).unwrap().id)
        .collect();
    let clock = ManualClock::new(clock_start());

    let mut sessions = vec![session_on(&backend, &clock), session_on(&backend, &clock)];
    for s in sessions.iter_mut() {
        s.open().await.unwrap();
    }

    for step in 0..24usize {
        let session = &mut sessions[step % 2];
        let member = members[(step / 2) % members.len()];
        clock.advance(TimeDelta::seconds(30));

        let result = if step % 3 == 0 {
            session.punch_out(member).await
        } else {
            session.punch_in(member).await
        };
        if let Err(e) = result {
            assert!(e.is_business(), "unexpected error: {e}");
        }

        for s in sessions.iter() {
            for m in &members {
                let open = s
                    .store()
                    .open_intervals()
                    .into_iter()
                    .filter(|iv| iv.member_id == *m)
                    .count();
                assert!(open <= 1);
            }
        }
    }

    let all = backend
        .members()
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect::<Vec<_>>();
    assert_eq!(all, members);
}
