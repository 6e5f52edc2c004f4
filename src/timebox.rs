//! Countdown for the overall test duration.
//!
//! [`TimeBox`] is the plain counter; [`Countdown`] runs it on a tokio
//! interval and publishes the remaining seconds through a watch channel.
//! Expiry is only reported, never acted upon.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBox {
    total_seconds: u64,
    remaining: u64,
    running: bool,
}

impl TimeBox {
    pub fn start(total_seconds: u64) -> Self {
        Self {
            total_seconds,
            remaining: total_seconds,
            running: true,
        }
    }

    /// Rebuilds the countdown from the session's start timestamp so that a
    /// restart does not hand the candidate a fresh time box.
    pub fn resume(limit_seconds: u64, started_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let elapsed = (now - started_at).num_seconds().max(0) as u64;
        Self {
            total_seconds: limit_seconds,
            remaining: limit_seconds.saturating_sub(elapsed),
            running: true,
        }
    }

    /// Decrements by one second. At zero, and after [`TimeBox::stop`], this is a no-op.
    pub fn tick(&mut self) -> u64 {
        if self.running && self.remaining > 0 {
            self.remaining -= 1;
        }
        self.remaining
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn total_seconds(&self) -> u64 {
        self.total_seconds
    }

    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    /// Sets the remaining time from the seconds elapsed since `remaining`
    /// was `base`. Never increases the remaining time.
    pub fn elapse(&mut self, base: u64, elapsed: Duration) -> u64 {
        if self.running {
            self.remaining = self.remaining.min(base.saturating_sub(elapsed.as_secs()));
        }
        self.remaining
    }

    /// Runs the time box on a background task that wakes every `period`.
    ///
    /// `period` only sets how often the remaining time is refreshed; the
    /// value itself comes from the elapsed clock time, so any period
    /// counts down at one second per second. Must be called from within a
    /// tokio runtime.
    pub fn spawn(mut self, period: Duration) -> Countdown {
        let (tx, rx) = watch::channel(self.remaining);
        let handle = tokio::spawn(async move {
            if self.is_expired() {
                info!("time box already expired");
                return;
            }
            let base = self.remaining;
            let started = Instant::now();
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let remaining = self.elapse(base, started.elapsed());
                tx.send_if_modified(|current| {
                    let changed = *current != remaining;
                    *current = remaining;
                    changed
                });
                if tx.is_closed() {
                    break;
                }
                if remaining == 0 {
                    info!(total_seconds = self.total_seconds, "time box expired");
                    break;
                }
            }
        });
        Countdown { rx, handle }
    }
}

/// Handle to a running countdown. Dropping it cancels the background task.
pub struct Countdown {
    rx: watch::Receiver<u64>,
    handle: JoinHandle<()>,
}

impl Countdown {
    pub fn remaining(&self) -> u64 {
        *self.rx.borrow()
    }

    pub fn is_expired(&self) -> bool {
        self.remaining() == 0
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.rx.clone()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
