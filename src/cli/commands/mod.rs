pub mod config;
pub mod export;
pub mod init;
pub mod log;
pub mod member;
pub mod punch;
pub mod status;
pub mod watch;

use crate::config::Config;
use crate::core::clock::SystemClock;
use crate::core::ports::IntervalFilter;
use crate::core::session::Session;
use crate::db::SqliteBackend;
use crate::errors::AppResult;
use chrono::Utc;

pub(crate) type CliSession = Session<SqliteBackend, SqliteBackend, SystemClock>;

pub(crate) fn open_backend(cfg: &Config) -> AppResult<SqliteBackend> {
    Ok(SqliteBackend::open(&cfg.database)?
        .with_feed_settings(cfg.poll_interval(), cfg.feed_capacity))
}

/// Connected session: subscribed to the change feed and resynced.
pub(crate) async fn open_session(cfg: &Config, backend: &SqliteBackend) -> AppResult<CliSession> {
    let since = cfg.resync_since(Utc::now())?;
    let mut session = Session::new(
        backend.clone(),
        backend.clone(),
        SystemClock,
        IntervalFilter::visible_since(since),
    )
    .with_retry_delay(cfg.poll_interval());
    session.open().await?;
    Ok(session)
}
