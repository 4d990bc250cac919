mod common;
use chrono::TimeDelta;
use common::{interval, ts};
use rbreaktracker::core::{ReportBuilder, ReportWindow};
use rbreaktracker::errors::AppError;
use rbreaktracker::models::{Interval, Member};

fn day_window() -> ReportWindow {
    ReportWindow::new(ts("2025-03-01T00:00:00Z"), ts("2025-03-02T00:00:00Z")).unwrap()
}

fn roster() -> Vec<Member> {
    vec![
        Member::new(1, "Alice", Some("alice@example.com"), false).unwrap(),
        Member::new(2, "Bob", None, true).unwrap(),
    ]
}

#[test]
fn test_window_must_be_ordered() {
    let t = ts("2025-03-01T00:00:00Z");
    assert!(matches!(
        ReportWindow::new(t, t),
        Err(AppError::Validation(_))
    ));
    assert!(ReportWindow::new(t + TimeDelta::seconds(1), t).is_err());
}

#[test]
fn test_window_is_half_open() {
    let intervals = vec![
        interval(1, 1, "2025-03-01T00:00:00Z", Some("2025-03-01T00:05:00Z")),
        interval(2, 1, "2025-03-02T00:00:00Z", Some("2025-03-02T00:05:00Z")),
        interval(3, 2, "2025-02-28T23:59:59Z", Some("2025-03-01T00:10:00Z")),
    ];

    let rows = ReportBuilder::build(&day_window(), &roster(), &intervals, None);
    let ids: Vec<i64> = rows.iter().map(|r| r.interval_id).collect();
    assert_eq!(ids, vec![1]);
}

#[test]
fn test_rows_order_by_punch_in_then_id() {
    let intervals = vec![
        interval(8, 2, "2025-03-01T10:00:00Z", Some("2025-03-01T10:10:00Z")),
        interval(3, 1, "2025-03-01T10:00:00Z", Some("2025-03-01T10:20:00Z")),
        interval(5, 1, "2025-03-01T08:00:00Z", Some("2025-03-01T08:05:00Z")),
    ];

    let rows = ReportBuilder::build(&day_window(), &roster(), &intervals, None);
    let ids: Vec<i64> = rows.iter().map(|r| r.interval_id).collect();
    assert_eq!(ids, vec![5, 3, 8]);

    assert_eq!(rows[0].name, "Alice");
    assert_eq!(rows[0].email, "alice@example.com");
    assert_eq!(rows[2].name, "Bob");
    assert_eq!(rows[2].email, "");
}

#[test]
fn test_removed_member_keeps_row() {
    let mut with_snapshot = interval(1, 9, "2025-03-01T09:00:00Z", Some("2025-03-01T09:05:00Z"));
    with_snapshot.member_name = Some("Former".into());
    with_snapshot.member_email = Some("former@example.com".into());
    let bare = interval(2, 10, "2025-03-01T09:30:00Z", Some("2025-03-01T09:35:00Z"));

    let rows = ReportBuilder::build(&day_window(), &roster(), [&with_snapshot, &bare], None);

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name, "Former");
    assert_eq!(rows[0].email, "former@example.com");
    assert_eq!(rows[1].name, "");
    assert_eq!(rows[1].email, "");
}

#[test]
fn test_current_member_wins_over_snapshot() {
    let mut iv = interval(1, 1, "2025-03-01T09:00:00Z", None);
    iv.member_name = Some("Old Alice".into());

    let rows = ReportBuilder::build(&day_window(), &roster(), [&iv], None);
    assert_eq!(rows[0].name, "Alice");
}

#[test]
fn test_open_interval_duration_reference() {
    let intervals = vec![interval(1, 1, "2025-03-01T22:00:00Z", None)];

    let live = ReportBuilder::build(
        &day_window(),
        &roster(),
        &intervals,
        Some(ts("2025-03-01T22:30:00Z")),
    );
    assert_eq!(live[0].duration, TimeDelta::minutes(30));
    assert!(live[0].punch_out.is_none());

    let past = ReportBuilder::build(
        &day_window(),
        &roster(),
        &intervals,
        Some(ts("2025-03-05T12:00:00Z")),
    );
    assert_eq!(past[0].duration, TimeDelta::hours(2));

    let no_clock = ReportBuilder::build(&day_window(), &roster(), &intervals, None);
    assert_eq!(no_clock[0].duration, TimeDelta::hours(2));
}

#[test]
fn test_empty_input_gives_empty_report() {
    let rows = ReportBuilder::build(&day_window(), &[], &Vec::<Interval>::new(), None);
    assert!(rows.is_empty());
}
