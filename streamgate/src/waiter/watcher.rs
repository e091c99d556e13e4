//! Filesystem watcher that drives [`WaitRegistry`] releases (§4.4, §9
//! "Filesystem watcher + AccessLock").
//!
//! Every create/modify event's basename is handed to
//! [`WaitRegistry::release`] after a 500 ms settle delay — long enough that
//! the writer has closed the file before a handler reads it (§8 property
//! 4). `release` is a no-op for a basename with no registered waiter, so
//! this fires for segments (`v0-0.ts`), sub-playlists (`v0.m3u8`, rewritten
//! repeatedly as ffmpeg appends segments), `index.json` and `error.log`
//! alike — whichever of those a caller is actually blocked on via
//! [`super::registry::WaitRegistry::wait`].
//!
//! An earlier version of this watcher filtered events through a
//! `\.m3u8$|index\.json|error\.log$` regex before releasing, mirroring the
//! original Go watcher's basename filter. That filter belongs to a
//! different method there (`Wait` itself short-circuits for paths that
//! don't match it, never blocking on segments at all) and has no
//! counterpart in `WaitRegistry::wait`, which blocks on *any* path per
//! spec — so filtering here only suppressed the segment releases it needs
//! to see. See DESIGN.md.

use std::path::Path;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use super::registry::WaitRegistry;

pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Start watching `output_dir` for file creations/modifications, releasing
/// matching `WaitRegistry` entries. Returns the live watcher; drop it to
/// stop.
pub fn spawn(output_dir: &Path, registry: WaitRegistry) -> notify::Result<RecommendedWatcher> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            let _ = tx.send(event);
        }
        Err(e) => warn!("filesystem watcher error: {e}"),
    })?;

    watcher.watch(output_dir, RecursiveMode::NonRecursive)?;

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                continue;
            }
            for path in &event.paths {
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                debug!(file = %name, "watcher observed file event");
                let registry = registry.clone();
                let name = name.to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(SETTLE_DELAY).await;
                    registry.release(&name);
                });
            }
        }
    });

    Ok(watcher)
}
