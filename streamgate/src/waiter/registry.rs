//! WaitRegistry (§3, §4.4): maps a relative output path to the
//! [`AccessLock`] that HTTP handlers suspend on while the transcoder
//! hasn't produced that file yet.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;

use super::access_lock::AccessLock;

/// Outcome of [`WaitRegistry::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Released,
    Cancelled,
}

#[derive(Clone, Default)]
pub struct WaitRegistry {
    locks: Arc<DashMap<String, Arc<AccessLock>>>,
}

impl WaitRegistry {
    pub fn new() -> Self {
        Self { locks: Arc::new(DashMap::new()) }
    }

    /// `Wait(ctx, path)`: release immediately if `output_dir/path` already
    /// exists; otherwise atomically look up or insert an `AccessLock` for
    /// `path` and suspend on either its release or `cancel`.
    ///
    /// `path` is normalized to its basename before use as the registry key,
    /// matching the basename the filesystem watcher releases by (output
    /// directories are flat, so basename is unambiguous).
    pub async fn wait(
        &self,
        output_dir: &Path,
        path: &str,
        cancel: tokio_util::sync::CancellationToken,
    ) -> WaitOutcome {
        let key = basename(path);

        if output_dir.join(key).exists() {
            return WaitOutcome::Released;
        }

        let lock = self.get_or_insert(key);

        tokio::select! {
            _ = lock.wait() => WaitOutcome::Released,
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
        }
    }

    /// Race-free LoadOrStore for `path`'s `AccessLock` (§4.4 concurrency).
    fn get_or_insert(&self, path: &str) -> Arc<AccessLock> {
        self.locks.entry(path.to_string()).or_insert_with(|| Arc::new(AccessLock::new())).clone()
    }

    /// Release the lock for `path`, if one is registered, and drop it from
    /// the map — called by the filesystem watcher after its settle delay.
    pub fn release(&self, path: &str) {
        if let Some((_, lock)) = self.locks.remove(path) {
            lock.unlock();
        }
    }

    #[cfg(test)]
    pub(crate) fn has_waiter(&self, path: &str) -> bool {
        self.locks.contains_key(basename(path))
    }
}

/// Strip any leading path separators and directory components, returning
/// the bare filename component a flat output directory uses as its key.
fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
