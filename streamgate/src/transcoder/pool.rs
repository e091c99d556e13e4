//! Transcode Pool (C3's at-most-one guarantee, §4.3/§8 property 1).
//!
//! Keyed by `outputDir`, coalesces concurrent `Transcode` invocations so
//! only the first starts a subprocess; everyone else observes the
//! in-flight entry. Success is memoized for 30 minutes (repeat hits on
//! `/index.m3u8` don't re-spawn); errors are not cached, so a later request
//! may retry. Shape mirrors `probe::cache::ProbeCache` /
//! `config::cache::ConfigCache`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Notify, OnceCell};

type RunOutcome = std::result::Result<(), String>;

struct CacheEntry {
    expires_at: Instant,
}

struct InFlightState {
    result: OnceCell<RunOutcome>,
    notify: Notify,
}

impl InFlightState {
    fn new() -> Self {
        Self { result: OnceCell::new(), notify: Notify::new() }
    }

    fn set_result(&self, result: RunOutcome) {
        let _ = self.result.set(result);
        self.notify.notify_waiters();
    }

    async fn wait(&self) -> RunOutcome {
        loop {
            if let Some(result) = self.result.get() {
                return result.clone();
            }
            let notified = self.notify.notified();
            if let Some(result) = self.result.get() {
                return result.clone();
            }
            notified.await;
        }
    }
}

type InFlight = Arc<InFlightState>;

const SUCCESS_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
pub struct TranscodePool {
    success: Arc<DashMap<String, CacheEntry>>,
    in_flight: Arc<DashMap<String, InFlight>>,
}

impl TranscodePool {
    pub fn new() -> Self {
        Self { success: Arc::new(DashMap::new()), in_flight: Arc::new(DashMap::new()) }
    }

    /// Ensure a transcoder is running (or has recently completed) for
    /// `key` (the output directory path), starting one via `start` only
    /// if no fresh success and no in-flight run exist.
    pub async fn ensure_running<F, Fut>(&self, key: &str, start: F) -> RunOutcome
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = RunOutcome>,
    {
        if let Some(entry) = self.success.get(key) {
            if Instant::now() < entry.expires_at {
                return Ok(());
            }
            drop(entry);
            self.success.remove(key);
        }

        let (state, is_owner) = self.get_or_create_in_flight(key);
        if !is_owner {
            return state.wait().await;
        }

        let outcome = start().await;
        self.complete_in_flight(key, &state, outcome.clone());
        outcome
    }

    fn get_or_create_in_flight(&self, key: &str) -> (InFlight, bool) {
        if let Some(existing) = self.in_flight.get(key) {
            return (existing.clone(), false);
        }
        let state = Arc::new(InFlightState::new());
        match self.in_flight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => (entry.get().clone(), false),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(state.clone());
                (state, true)
            }
        }
    }

    fn complete_in_flight(&self, key: &str, state: &InFlight, outcome: RunOutcome) {
        let Some((_, current)) = self.in_flight.remove(key) else {
            return;
        };
        if !Arc::ptr_eq(&current, state) {
            self.in_flight.insert(key.to_string(), current);
            return;
        }
        current.set_result(outcome.clone());

        if outcome.is_ok() {
            self.success.insert(key.to_string(), CacheEntry { expires_at: Instant::now() + SUCCESS_TTL });
        }
        // Errors are intentionally not cached: the next trigger retries.
    }

    pub fn is_running_or_done(&self, key: &str) -> bool {
        self.in_flight.contains_key(key) || self.success.contains_key(key)
    }
}

impl Default for TranscodePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn only_one_start_per_key_concurrently() {
        let pool = Arc::new(TranscodePool::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let pool = pool.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                pool.ensure_running("job-1", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(())
                })
                .await
            }));
        }

        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let pool = TranscodePool::new();
        let first = pool.ensure_running("job-2", || async { Err("boom".to_string()) }).await;
        assert!(first.is_err());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_inner = calls.clone();
        let second = pool
            .ensure_running("job-2", || async move {
                calls_inner.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(second.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_short_circuits_later_calls() {
        let pool = TranscodePool::new();
        pool.ensure_running("job-3", || async { Ok(()) }).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_inner = calls.clone();
        pool.ensure_running("job-3", || async move {
            calls_inner.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
