//! In-memory probe memoization with in-flight request coalescing.
//!
//! Modeled directly on the teacher's `config::cache::ConfigCache`: a
//! `DashMap` of TTL-expiring entries plus a second `DashMap` of in-flight
//! futures so concurrent probes for the same `(input, outputDir)` key
//! collapse onto a single execution. Unlike the teacher's cache, successes
//! and failures carry different TTLs (§4.1: 30 minutes / 10 seconds).

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Notify, OnceCell};

use super::ProbeResult;

type ProbeOutcome = std::result::Result<ProbeResult, String>;

#[derive(Clone)]
struct CacheEntry {
    outcome: ProbeOutcome,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

struct InFlightState {
    result: OnceCell<ProbeOutcome>,
    notify: Notify,
}

impl InFlightState {
    fn new() -> Self {
        Self {
            result: OnceCell::new(),
            notify: Notify::new(),
        }
    }

    fn set_result(&self, result: ProbeOutcome) {
        let _ = self.result.set(result);
        self.notify.notify_waiters();
    }

    async fn wait(&self) -> ProbeOutcome {
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

/// Probe memoization cache keyed by `(input, outputDir)`.
#[derive(Clone)]
pub struct ProbeCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    in_flight: Arc<DashMap<String, InFlight>>,
    success_ttl: Duration,
    error_ttl: Duration,
}

impl ProbeCache {
    pub fn new() -> Self {
        Self::with_ttls(super::SUCCESS_TTL, super::ERROR_TTL)
    }

    pub fn with_ttls(success_ttl: Duration, error_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            success_ttl,
            error_ttl,
        }
    }

    fn key(input: &str, output_dir: &Path) -> String {
        format!("{input}\0{}", output_dir.display())
    }

    /// Probe `input`/`output_dir`, reusing a fresh cached result or an
    /// in-flight call for the same key when one exists.
    pub async fn get_or_probe<F, Fut>(
        &self,
        input: &str,
        output_dir: &Path,
        probe_fn: F,
    ) -> std::result::Result<ProbeResult, String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<ProbeResult, String>>,
    {
        let key = Self::key(input, output_dir);

        if let Some(entry) = self.entries.get(&key) {
            if !entry.is_expired() {
                return entry.outcome.clone();
            }
            drop(entry);
            self.entries.remove(&key);
        }

        let (state, is_owner) = self.get_or_create_in_flight(&key);
        if !is_owner {
            return state.wait().await;
        }

        let outcome = probe_fn().await;
        self.complete_in_flight(&key, &state, outcome.clone());
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

    fn complete_in_flight(&self, key: &str, state: &InFlight, outcome: ProbeOutcome) {
        let Some((_, current)) = self.in_flight.remove(key) else {
            return;
        };
        if !Arc::ptr_eq(&current, state) {
            self.in_flight.insert(key.to_string(), current);
            return;
        }
        current.set_result(outcome.clone());

        let ttl = if outcome.is_ok() {
            self.success_ttl
        } else {
            self.error_ttl
        };
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                outcome,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ProbeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_result() -> ProbeResult {
        ProbeResult::default()
    }

    #[tokio::test]
    async fn caches_success_and_skips_reprobe() {
        let cache = ProbeCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let out = cache
                .get_or_probe("http://x", &PathBuf::from("/tmp/out"), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(sample_result())
                })
                .await;
            assert!(out.is_ok());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_expire_quickly() {
        let cache = ProbeCache::with_ttls(Duration::from_secs(60), Duration::from_millis(5));
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_inner = calls.clone();
        let first = cache
            .get_or_probe("http://x", &PathBuf::from("/tmp/out"), || async move {
                calls_inner.fetch_add(1, Ordering::SeqCst);
                Err("boom".to_string())
            })
            .await;
        assert!(first.is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;

        let calls_inner = calls.clone();
        let second = cache
            .get_or_probe("http://x", &PathBuf::from("/tmp/out"), || async move {
                calls_inner.fetch_add(1, Ordering::SeqCst);
                Ok(sample_result())
            })
            .await;
        assert!(second.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_calls_coalesce() {
        let cache = Arc::new(ProbeCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_probe("http://x", &PathBuf::from("/tmp/out"), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(sample_result())
                    })
                    .await
            }));
        }

        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
