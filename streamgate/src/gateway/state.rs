//! Shared gateway state (§4.6), the streamgate analogue of the teacher's
//! `api::server::AppState`: everywhere the teacher threads repositories and
//! managers through `Arc`s, this threads the per-process singletons the
//! middleware chain shares across every request.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::config::GatewayConfig;
use crate::probe::cache::ProbeCache;
use crate::transcoder::pool::TranscodePool;
use crate::waiter::Waiter;

/// Minimum spacing between recorded touches for the same output directory
/// (§4.6 step 3: "rate-limited: at most once per 30 s per directory").
pub const TOUCH_INTERVAL: Duration = Duration::from_secs(30);

/// Per-`outputDir` state lazily created on first request for that
/// directory: the live filesystem [`Waiter`] and the last-touch timestamp.
pub struct JobState {
    pub waiter: Waiter,
    last_touch: Mutex<Option<Instant>>,
}

impl JobState {
    fn new(output_dir: &std::path::Path) -> crate::Result<Self> {
        let waiter = Waiter::spawn(output_dir)
            .map_err(|e| crate::Error::Other(format!("failed to start filesystem watcher: {e}")))?;
        Ok(Self { waiter, last_touch: Mutex::new(None) })
    }

    /// Record activity now, returning whether a touch marker write is due
    /// (rate-limited to once per [`TOUCH_INTERVAL`]).
    pub fn should_touch(&self) -> bool {
        let mut last = self.last_touch.lock();
        let now = Instant::now();
        let due = last.is_none_or(|t| now.duration_since(t) >= TOUCH_INTERVAL);
        if due {
            *last = Some(now);
        }
        due
    }
}

/// Tracks how many transcoder subprocesses are currently running, so the
/// orchestrator's `to-completion` mode (§4.7/§4.8) can wait for the last one
/// to finish instead of letting the process exit out from under it.
#[derive(Default)]
pub struct ActiveTranscodes {
    count: AtomicUsize,
    drained: Notify,
}

impl ActiveTranscodes {
    fn start(self: &Arc<Self>) -> ActiveTranscodeGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        ActiveTranscodeGuard(self.clone())
    }

    /// Resolve once no transcoder is running, waking immediately if none
    /// currently is.
    pub async fn wait_for_drain(&self) {
        loop {
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            let notified = self.drained.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// RAII handle held for the lifetime of a single transcoder run.
pub struct ActiveTranscodeGuard(Arc<ActiveTranscodes>);

impl Drop for ActiveTranscodeGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.drained.notify_waiters();
        }
    }
}

/// Application state shared across every request, cloned cheaply (every
/// field is an `Arc` or a `Clone`-cheap concurrent map).
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<GatewayConfig>,
    pub probe_cache: ProbeCache,
    pub transcode_pool: TranscodePool,
    pub idle: Arc<crate::idle::IdleExpiryGovernor>,
    pub active_transcodes: Arc<ActiveTranscodes>,
    jobs: Arc<DashMap<PathBuf, Arc<JobState>>>,
}

impl AppState {
    pub fn new(cfg: GatewayConfig) -> Self {
        let idle = Arc::new(crate::idle::IdleExpiryGovernor::new(cfg.grace()));
        Self {
            cfg: Arc::new(cfg),
            probe_cache: ProbeCache::new(),
            transcode_pool: TranscodePool::new(),
            idle,
            active_transcodes: Arc::new(ActiveTranscodes::default()),
            jobs: Arc::new(DashMap::new()),
        }
    }

    /// Mark a transcoder run as started; the returned guard decrements the
    /// count and wakes any `wait_for_drain` caller on drop.
    pub fn track_transcode(&self) -> ActiveTranscodeGuard {
        self.active_transcodes.start()
    }

    /// Fetch or lazily create the [`JobState`] for `output_dir`, ensuring
    /// the directory exists and its filesystem watcher is running.
    pub async fn job_for(&self, output_dir: &std::path::Path) -> crate::Result<Arc<JobState>> {
        if let Some(existing) = self.jobs.get(output_dir) {
            return Ok(existing.clone());
        }

        crate::utils::fs::ensure_dir_all(output_dir).await?;

        let state = Arc::new(JobState::new(output_dir)?);
        match self.jobs.entry(output_dir.to_path_buf()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Ok(entry.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(state.clone());
                Ok(state)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_resolves_immediately_with_nothing_running() {
        let tracker = Arc::new(ActiveTranscodes::default());
        tokio::time::timeout(Duration::from_millis(50), tracker.wait_for_drain())
            .await
            .expect("should not block when nothing is tracked");
    }

    #[tokio::test]
    async fn drain_waits_for_the_last_guard_to_drop() {
        let tracker = Arc::new(ActiveTranscodes::default());
        let guard = tracker.start();

        let waiter = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.wait_for_drain().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("drain should resolve once the guard drops")
            .unwrap();
    }
}
