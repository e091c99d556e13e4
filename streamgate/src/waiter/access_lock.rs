//! Single-fire release primitive (§3 "AccessLock"), grounded on the
//! original `services.AccessLock`: a channel that closes exactly once
//! under a mutex-guarded flag. `tokio::sync::Notify` plays the role of the
//! channel; `closed` makes `unlock()` idempotent and lets late subscribers
//! short-circuit instead of blocking forever.

use parking_lot::Mutex;
use tokio::sync::Notify;

pub struct AccessLock {
    notify: Notify,
    closed: Mutex<bool>,
}

impl AccessLock {
    pub fn new() -> Self {
        Self { notify: Notify::new(), closed: Mutex::new(false) }
    }

    /// Release this lock. Idempotent: a second call is a no-op (§8
    /// property 2, "release monotonicity").
    pub fn unlock(&self) {
        let mut closed = self.closed.lock();
        if *closed {
            return;
        }
        *closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_unlocked(&self) -> bool {
        *self.closed.lock()
    }

    /// Suspend until [`unlock`](Self::unlock) is called (by anyone,
    /// including a call that already happened).
    pub async fn wait(&self) {
        loop {
            if self.is_unlocked() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_unlocked() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for AccessLock {
    fn default() -> Self {
        Self::new()
    }
}
