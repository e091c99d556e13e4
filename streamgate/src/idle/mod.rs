//! Idle Expiry Governor (C7, §4.7).
//!
//! A single reset-on-activity timer: every outbound response write resets
//! it, and after `grace` of silence it fires its termination signal. The
//! gateway's serve loop selects against [`IdleExpiryGovernor::expired`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Reset-on-activity timer backing idle shutdown.
pub struct IdleExpiryGovernor {
    grace: Duration,
    last_activity: AtomicU64,
    epoch: Instant,
    reset_notify: Notify,
}

impl IdleExpiryGovernor {
    pub fn new(grace: Duration) -> Self {
        let epoch = Instant::now();
        Self {
            grace,
            last_activity: AtomicU64::new(0),
            epoch,
            reset_notify: Notify::new(),
        }
    }

    /// Record activity, resetting the expiry clock (§4.7: "every outbound
    /// `Write`").
    pub fn touch(&self) {
        let elapsed = self.epoch.elapsed().as_millis() as u64;
        self.last_activity.store(elapsed, Ordering::SeqCst);
        self.reset_notify.notify_waiters();
    }

    fn millis_since_last_activity(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64 - self.last_activity.load(Ordering::SeqCst)
    }

    /// Resolve once `grace` has elapsed with no intervening [`touch`](Self::touch).
    /// Loops internally: a `touch()` during the sleep restarts the wait.
    pub async fn expired(&self) {
        loop {
            let remaining = self.grace.saturating_sub(Duration::from_millis(self.millis_since_last_activity()));
            if remaining.is_zero() {
                return;
            }

            let notified = self.reset_notify.notified();
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {
                    if self.millis_since_last_activity() as u128 >= self.grace.as_millis() {
                        return;
                    }
                }
                _ = notified => {}
            }
        }
    }
}
