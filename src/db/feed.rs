//! Change feed over the `changes` table.
//!
//! A subscriber gets a poller task tailing the log from the head at the time
//! of subscription. A failed poll ends the task, which closes the channel and
//! lets the subscriber fall back to a resync.

use crate::core::ports::Subscription;
use crate::db::queries::{change_head, load_changes_after};
use crate::errors::{AppError, AppResult};
use crate::models::{ChangeEvent, ChangeKind, Interval};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{trace, warn};

const POLL_BATCH: usize = 256;

pub(crate) fn lock(conn: &Mutex<Connection>) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| AppError::Transport("database connection lock poisoned".into()))
}

/// Must be called from within a tokio runtime.
pub(crate) fn subscribe(
    conn: Arc<Mutex<Connection>>,
    poll_interval: Duration,
    capacity: usize,
) -> AppResult<Subscription> {
    let start = change_head(&*lock(&conn)?)?;
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let task = tokio::spawn(async move {
        let mut cursor = start;
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let batch = match poll_once(&conn, cursor) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, cursor, "change feed poll failed");
                    break;
                }
            };

            for (seq, event) in batch {
                cursor = seq;
                let Some(event) = event else { continue };
                if tx.send(event).await.is_err() {
                    // subscriber gone
                    return;
                }
            }
        }
    });

    Ok(Subscription::new(rx, task))
}

fn poll_once(
    conn: &Mutex<Connection>,
    cursor: i64,
) -> AppResult<Vec<(i64, Option<ChangeEvent>)>> {
    let rows = {
        let guard = lock(conn)?;
        load_changes_after(&guard, cursor, POLL_BATCH)?
    };

    if !rows.is_empty() {
        trace!(count = rows.len(), cursor, "change rows fetched");
    }

    Ok(rows
        .into_iter()
        .map(|(seq, kind, payload)| (seq, decode(seq, &kind, &payload)))
        .collect())
}

/// Undecodable rows are logged and skipped; they must not stall the feed.
fn decode(seq: i64, kind: &str, payload: &str) -> Option<ChangeEvent> {
    let Some(kind) = ChangeKind::from_db_str(kind) else {
        warn!(seq, kind, "unknown change kind");
        return None;
    };
    match serde_json::from_str::<Interval>(payload) {
        Ok(interval) => Some(ChangeEvent { kind, interval }),
        Err(e) => {
            warn!(seq, error = %e, "undecodable change payload");
            None
        }
    }
}
