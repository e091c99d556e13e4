//! Waiter (C4): serializes HTTP requests for not-yet-existing output files
//! onto filesystem-create events (§3 "WaitRegistry", §4.4).
//!
//! Composes [`access_lock::AccessLock`] (single-fire release primitive),
//! [`registry::WaitRegistry`] (the concurrent map keyed by relative path),
//! and [`watcher`] (the live `notify` watcher that drives release). `Waiter`
//! itself is the handle the gateway holds: constructing one starts the
//! watcher, and `wait` is the one operation callers need.

pub mod access_lock;
pub mod registry;
pub mod watcher;

use std::path::{Path, PathBuf};

use notify::RecommendedWatcher;
use tokio_util::sync::CancellationToken;

pub use registry::WaitOutcome;
use registry::WaitRegistry;

/// Live waiter for one output directory: owns the registry and the
/// filesystem watcher that releases it.
pub struct Waiter {
    output_dir: PathBuf,
    registry: WaitRegistry,
    _watcher: RecommendedWatcher,
}

impl Waiter {
    /// Start watching `output_dir`. The directory must already exist.
    pub fn spawn(output_dir: &Path) -> notify::Result<Self> {
        let registry = WaitRegistry::new();
        let watcher = watcher::spawn(output_dir, registry.clone())?;
        Ok(Self { output_dir: output_dir.to_path_buf(), registry, _watcher: watcher })
    }

    /// `Wait(ctx, path)` (§4.4): release immediately if the file already
    /// exists, otherwise suspend until the watcher observes its creation or
    /// `cancel` fires.
    pub async fn wait(&self, path: &str, cancel: CancellationToken) -> WaitOutcome {
        self.registry.wait(&self.output_dir, path, cancel).await
    }
}
