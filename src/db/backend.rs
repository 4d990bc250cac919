//! SQLite-backed persistence and change notification.
//!
//! Cheap to clone: every clone shares the same connection, so several
//! sessions (one per viewer) can run against one backend.

use crate::core::ports::{ChangeNotifier, IntervalFilter, Persistence, Subscription};
use crate::db::feed::{self, lock};
use crate::db::log::{LogRow, load_log, ttlog};
use crate::db::pool::DbPool;
use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{ChangeEvent, Interval, IntervalId, Member, MemberId};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::warn;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    poll_interval: Duration,
    feed_capacity: usize,
}

impl SqliteBackend {
    pub fn open(path: &str) -> AppResult<Self> {
        Ok(Self::from_pool(DbPool::new(path)?))
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Ok(Self::from_pool(DbPool::in_memory()?))
    }

    fn from_pool(pool: DbPool) -> Self {
        Self {
            conn: pool.into_shared(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }

    /// How long a write waits on another process holding the database lock
    /// before giving up with a transport error.
    pub fn with_busy_timeout(self, timeout: Duration) -> AppResult<Self> {
        self.conn()?.busy_timeout(timeout)?;
        Ok(self)
    }

    pub fn with_feed_settings(mut self, poll_interval: Duration, capacity: usize) -> Self {
        self.poll_interval = poll_interval;
        self.feed_capacity = capacity;
        self
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        lock(&self.conn)
    }

    // ---------------------------
    // Roster
    // ---------------------------

    pub fn add_member(&self, name: &str, email: Option<&str>, is_admin: bool) -> AppResult<Member> {
        let mut member = Member::new(0, name, email, is_admin)?;
        let conn = self.conn()?;
        member.id = queries::insert_member(&conn, &member)?;
        audit(&conn, "member_add", &member.id.to_string(), &member.name);
        Ok(member)
    }

    /// Remove a member. An open interval is closed at `at` first so that
    /// nobody stays on break forever; the history keeps the identity snapshot.
    pub fn remove_member(&self, id: MemberId, at: DateTime<Utc>) -> AppResult<Member> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let member = queries::load_member(&tx, id)?
            .ok_or_else(|| AppError::NotFound(format!("member {} does not exist", id)))?;

        if let Some(open) = queries::load_open_interval_for(&tx, id)? {
            let punch_out = at.max(open.punch_in);
            queries::close_open_interval(&tx, open.id, punch_out)?;
            let closed = queries::load_interval(&tx, open.id)?
                .unwrap_or_else(|| open.closed_at(punch_out));
            queries::append_change(&tx, &ChangeEvent::update(closed))?;
        }

        queries::delete_member(&tx, id)?;
        tx.commit()?;

        audit(&conn, "member_remove", &id.to_string(), &member.name);
        Ok(member)
    }

    /// Resolve a member by numeric id or (case-insensitive) name.
    pub fn find_member(&self, key: &str) -> AppResult<Member> {
        let conn = self.conn()?;

        if let Ok(id) = key.trim().parse::<MemberId>()
            && let Some(m) = queries::load_member(&conn, id)?
        {
            return Ok(m);
        }

        let mut matches = queries::load_member_by_name(&conn, key)?;
        match matches.len() {
            0 => Err(AppError::NotFound(format!("no member named '{}'", key))),
            1 => Ok(matches.remove(0)),
            n => Err(AppError::Validation(format!(
                "'{}' matches {} members, use the member id",
                key, n
            ))),
        }
    }

    pub fn members(&self) -> AppResult<Vec<Member>> {
        queries::load_members(&*self.conn()?)
    }

    // ---------------------------
    // Audit log
    // ---------------------------

    pub fn log(&self, operation: &str, target: &str, message: &str) {
        if let Ok(conn) = self.conn() {
            audit(&conn, operation, target, message);
        }
    }

    pub fn log_entries(&self, limit: usize) -> AppResult<Vec<LogRow>> {
        load_log(&*self.conn()?, limit)
    }
}

/// Non-blocking: a failed audit write never fails the operation.
fn audit(conn: &Connection, operation: &str, target: &str, message: &str) {
    if let Err(e) = ttlog(conn, operation, target, message) {
        warn!(error = %e, operation, "failed to write internal log");
    }
}

/// Busy / locked database: reported as a transport failure.
fn as_transport(e: AppError) -> AppError {
    match e {
        AppError::Db(rusqlite::Error::SqliteFailure(err, msg))
            if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            AppError::Transport(format!(
                "database unavailable: {}",
                msg.unwrap_or_else(|| err.to_string())
            ))
        }
        other => other,
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

impl SqliteBackend {
    fn insert_interval(
        &self,
        member_id: MemberId,
        punch_in: DateTime<Utc>,
    ) -> AppResult<Interval> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let member = queries::load_member(&tx, member_id)?
            .ok_or_else(|| AppError::NotFound(format!("member {} does not exist", member_id)))?;

        let id = match queries::insert_open_interval(&tx, &member, punch_in, Utc::now()) {
            Ok(id) => id,
            Err(AppError::Db(e)) if is_constraint_violation(&e) => {
                return Err(AppError::Conflict(format!(
                    "member {} already has an open interval",
                    member_id
                )));
            }
            Err(e) => return Err(e),
        };

        let created = queries::load_interval(&tx, id)?
            .ok_or_else(|| AppError::Transport(format!("interval {} vanished after insert", id)))?;
        queries::append_change(&tx, &ChangeEvent::insert(created.clone()))?;
        tx.commit()?;

        audit(&conn, "punch_in", &member_id.to_string(), &member.name);
        Ok(created)
    }

    fn finish_interval(
        &self,
        id: IntervalId,
        punch_out: DateTime<Utc>,
    ) -> AppResult<Interval> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let affected = match queries::close_open_interval(&tx, id, punch_out) {
            Ok(n) => n,
            Err(AppError::Db(e)) if is_constraint_violation(&e) => {
                return Err(AppError::Validation(format!(
                    "punch-out precedes punch-in for interval {}",
                    id
                )));
            }
            Err(e) => return Err(e),
        };
        if affected == 0 {
            return Err(AppError::NotFound(format!(
                "interval {} is not open",
                id
            )));
        }

        let closed = queries::load_interval(&tx, id)?
            .ok_or_else(|| AppError::NotFound(format!("interval {} does not exist", id)))?;
        queries::append_change(&tx, &ChangeEvent::update(closed.clone()))?;
        tx.commit()?;

        audit(&conn, "punch_out", &closed.member_id.to_string(), &format!("interval {}", id));
        Ok(closed)
    }
}

impl Persistence for SqliteBackend {
    async fn create_interval(
        &self,
        member_id: MemberId,
        punch_in: DateTime<Utc>,
    ) -> AppResult<Interval> {
        self.insert_interval(member_id, punch_in).map_err(as_transport)
    }

    async fn close_interval(
        &self,
        id: IntervalId,
        punch_out: DateTime<Utc>,
    ) -> AppResult<Interval> {
        self.finish_interval(id, punch_out).map_err(as_transport)
    }

    async fn list_intervals(&self, filter: &IntervalFilter) -> AppResult<Vec<Interval>> {
        self.conn()
            .and_then(|conn| queries::load_intervals(&conn, filter))
            .map_err(as_transport)
    }

    async fn list_members(&self) -> AppResult<Vec<Member>> {
        self.members().map_err(as_transport)
    }
}

impl ChangeNotifier for SqliteBackend {
    fn subscribe(&self) -> AppResult<Subscription> {
        feed::subscribe(Arc::clone(&self.conn), self.poll_interval, self.feed_capacity)
    }
}
