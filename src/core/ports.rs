//! Narrow interfaces to the collaborators the core talks to: the
//! authoritative persistence layer and its change notification channel.

use crate::errors::AppResult;
use crate::models::{ChangeEvent, Interval, IntervalId, Member, MemberId};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Authoritative store of intervals and members.
///
/// Implementations must enforce at-most-one-open-interval per member at write
/// time and report a violation as `AppError::Conflict`.
#[allow(async_fn_in_trait)]
pub trait Persistence {
    async fn create_interval(
        &self,
        member_id: MemberId,
        punch_in: DateTime<Utc>,
    ) -> AppResult<Interval>;

    /// Close a still-open interval; `AppError::NotFound` otherwise.
    async fn close_interval(
        &self,
        id: IntervalId,
        punch_out: DateTime<Utc>,
    ) -> AppResult<Interval>;

    async fn list_intervals(&self, filter: &IntervalFilter) -> AppResult<Vec<Interval>>;

    async fn list_members(&self) -> AppResult<Vec<Member>>;
}

/// Source of change notifications for intervals.
pub trait ChangeNotifier {
    fn subscribe(&self) -> AppResult<Subscription>;
}

/// Receiving side of a change feed.
///
/// Dropping it unsubscribes: the feed task behind it, if any, is aborted.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<ChangeEvent>,
    feed: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<ChangeEvent>, feed: JoinHandle<()>) -> Self {
        Self {
            rx,
            feed: Some(feed),
        }
    }

    /// Subscription fed directly by whoever holds the sender.
    pub fn from_channel(rx: mpsc::Receiver<ChangeEvent>) -> Self {
        Self { rx, feed: None }
    }

    /// Next event; `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }
}

/// Selection of intervals used for fetching and for resync windows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalFilter {
    /// Inclusive lower bound on punch-in.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on punch-in.
    pub until: Option<DateTime<Utc>>,
    pub member_id: Option<MemberId>,
    /// Open intervals match regardless of the punch-in bounds.
    pub include_open: bool,
}

impl IntervalFilter {
    pub fn all() -> Self {
        Self {
            include_open: true,
            ..Self::default()
        }
    }

    /// Recent history plus whatever is still open.
    pub fn visible_since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            include_open: true,
            ..Self::default()
        }
    }

    pub fn punched_in_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            since: Some(start),
            until: Some(end),
            ..Self::default()
        }
    }

    pub fn matches(&self, iv: &Interval) -> bool {
        if let Some(member_id) = self.member_id
            && iv.member_id != member_id
        {
            return false;
        }
        if self.include_open && iv.is_open() {
            return true;
        }
        self.since.is_none_or(|s| iv.punch_in >= s) && self.until.is_none_or(|u| iv.punch_in < u)
    }
}
