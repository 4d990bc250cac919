#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use chrono::{DateTime, TimeDelta, Utc};
use rbreaktracker::core::ports::IntervalFilter;
use rbreaktracker::core::{ManualClock, Session};
use rbreaktracker::db::SqliteBackend;
use rbreaktracker::models::Interval;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub fn rbt() -> Command {
    cargo_bin_cmd!("rbreaktracker")
}

/// Create a unique test DB path inside the system temp dir and remove any existing file
pub fn setup_test_db(name: &str) -> String {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("{}_rbreaktracker.sqlite", name));
    let db_path = path.to_string_lossy().to_string();
    for suffix in ["", "-wal", "-shm"] {
        fs::remove_file(format!("{}{}", db_path, suffix)).ok();
    }
    db_path
}

/// Create a temporary output file path inside tempdir and ensure it's removed
pub fn temp_out(name: &str, ext: &str) -> String {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("{}_out.{}", name, ext));
    let p = path.to_string_lossy().to_string();
    fs::remove_file(&p).ok();
    p
}

/// Initialize a DB and register two members (ids 1 and 2)
pub fn init_db_with_members(db_path: &str) {
    rbt()
        .args(["--db", db_path, "--test", "init"])
        .assert()
        .success();

    rbt()
        .args([
            "--db",
            db_path,
            "member",
            "add",
            "Alice",
            "--email",
            "alice@example.com",
        ])
        .assert()
        .success();

    rbt()
        .args(["--db", db_path, "member", "add", "Bob", "--admin"])
        .assert()
        .success();
}

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC 3339 timestamp")
        .with_timezone(&Utc)
}

pub fn interval(id: i64, member_id: i64, punch_in: &str, punch_out: Option<&str>) -> Interval {
    let punch_in = ts(punch_in);
    Interval {
        id,
        member_id,
        punch_in,
        punch_out: punch_out.map(ts),
        created_at: punch_in,
        member_name: None,
        member_email: None,
    }
}

/// In-memory backend with a fast-polling change feed.
pub fn memory_backend() -> SqliteBackend {
    SqliteBackend::open_in_memory()
        .expect("in-memory backend")
        .with_feed_settings(Duration::from_millis(10), 64)
}

pub type TestSession = Session<SqliteBackend, SqliteBackend, ManualClock>;

pub fn session_on(backend: &SqliteBackend, clock: &ManualClock) -> TestSession {
    Session::new(
        backend.clone(),
        backend.clone(),
        clock.clone(),
        IntervalFilter::visible_since(clock_start() - TimeDelta::days(7)),
    )
}

pub fn clock_start() -> DateTime<Utc> {
    ts("2025-03-01T09:00:00Z")
}

/// Upper bound for anything waiting on the polled change feed.
pub const FEED_TIMEOUT: Duration = Duration::from_secs(5);
