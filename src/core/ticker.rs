//! Periodic tick driving live duration refreshes.
//!
//! The timer runs as its own task and is aborted by `cancel()` or when the
//! `Ticker` is dropped, so it cannot outlive the session that started it.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug)]
pub struct Ticker {
    rx: mpsc::Receiver<()>,
    task: JoinHandle<()>,
    cancelled: bool,
}

impl Ticker {
    /// Must be called from within a tokio runtime.
    pub fn start(period: Duration) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                // a slow reader just misses ticks
                match tx.try_send(()) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
                    Err(mpsc::error::TrySendError::Closed(())) => break,
                }
            }
        });
        Self {
            rx,
            task,
            cancelled: false,
        }
    }

    /// Next tick, or `None` once cancelled.
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Stops the timer; at most one already buffered tick is still returned.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.rx.close();
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
