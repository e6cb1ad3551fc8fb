//! Daily queue clear at a fixed local wall-clock minute.
//!
//! The day of the last clear lives only in memory. After a restart inside
//! the trigger minute the clear can fire a second time that day; reports
//! carry `first_since_start` so callers can see when that may have happened.

use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::TankQueue;

/// Polling coarser than this could skip the trigger minute entirely.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of one daily clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearReport {
    pub date: NaiveDate,
    pub evicted: usize,
    /// False if the snapshot write failed; the queue is still empty in memory
    pub persisted: bool,
    /// True for the first clear after process start
    pub first_since_start: bool,
}

#[derive(Debug, Clone)]
pub struct DailyClear {
    at: NaiveTime,
    last_fired: Option<NaiveDate>,
}

impl DailyClear {
    /// Clear once per day during the minute starting at `hour:minute`.
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(|at| Self {
            at,
            last_fired: None,
        })
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    pub fn last_fired(&self) -> Option<NaiveDate> {
        self.last_fired
    }

    /// Whether `now` is inside the trigger minute of a day not yet cleared.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now.hour() == self.at.hour()
            && now.minute() == self.at.minute()
            && self.last_fired != Some(now.date())
    }

    /// Run one check. Returns a report when the clear fired.
    pub async fn tick(&mut self, queue: &TankQueue, now: NaiveDateTime) -> Option<ClearReport> {
        if !self.is_due(now) {
            return None;
        }

        let first_since_start = self.last_fired.is_none();
        self.last_fired = Some(now.date());

        let committed = queue.clear_for_maintenance().await;
        let evicted = committed.value;
        if evicted > 0 {
            info!(evicted, date = %now.date(), "daily clear emptied the queue");
        } else {
            info!(date = %now.date(), "daily clear found the queue already empty");
        }

        Some(ClearReport {
            date: now.date(),
            evicted,
            persisted: committed.write_error.is_none(),
            first_since_start,
        })
    }

    /// Poll on a timer using local time. Reports are sent on the returned channel;
    /// a dropped receiver does not stop the timer.
    pub fn spawn(
        mut self,
        queue: TankQueue,
        period: Duration,
    ) -> (JoinHandle<()>, mpsc::UnboundedReceiver<ClearReport>) {
        let period = poll_period(period);
        let (tx, rx) = mpsc::unbounded_channel();

        info!(
            at = %self.at.format("%H:%M"),
            "daily queue clear scheduled (last clear day is not persisted across restarts)"
        );

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let now = Local::now().naive_local();
                if let Some(report) = self.tick(&queue, now).await {
                    let _ = tx.send(report);
                }
            }
        });

        (handle, rx)
    }
}

/// Clamp a requested poll period into `(0, MAX_POLL_INTERVAL]`.
fn poll_period(requested: Duration) -> Duration {
    if requested > MAX_POLL_INTERVAL || requested.is_zero() {
        warn!(
            requested_secs = requested.as_secs(),
            "daily clear poll interval out of range, using 60s"
        );
        MAX_POLL_INTERVAL
    } else {
        requested
    }
}
