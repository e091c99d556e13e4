//! Snapshotter (C10, §4.10) — optional, feature-gated, off by default.
//!
//! On start, checks a remote "done" marker keyed by
//! `sha1("transcoder" + info_hash + file_path)`; if present, this is a
//! no-op. Otherwise runs the transcoder in the background while a ratio
//! monitor watches served-plus-previously-downloaded bytes against the
//! source's reported length; once `snapshot_download_ratio` is crossed,
//! the whole output directory is uploaded and the marker stored.
//! Grounded on `services/snapshotter.go` + `services/s3_storage.go`; see
//! [`store`] for why the object store itself is a pluggable trait rather
//! than a vendored S3 SDK.

pub mod ratio;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use sha1::{Digest, Sha1};
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::planner::HLSPlan;
use crate::{Error, Result};
pub use ratio::BytesServedCounter;
pub use store::ObjectStore;

/// `sha1("transcoder" + info_hash + file_path)`, hex-encoded — the
/// snapshot marker's object key.
pub fn marker_key(info_hash: &str, file_path: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(b"transcoder");
    hasher.update(info_hash.as_bytes());
    hasher.update(file_path.as_bytes());
    hex::encode(hasher.finalize())
}

/// `HEAD` the source for its reported length; 0 (never blocks the ratio
/// monitor) when the server doesn't report one or the request fails.
async fn source_content_length(source_url: &str) -> u64 {
    match reqwest::Client::new().head(source_url).send().await {
        Ok(resp) => resp.content_length().unwrap_or(0),
        Err(e) => {
            warn!(error = %e, "failed to HEAD source for snapshot ratio monitor");
            0
        }
    }
}

/// Run the transcoder for `plan`, snapshotting `output_dir` to `store`
/// once the download ratio threshold is crossed, unless a "done" marker
/// for this `(info_hash, output_dir)` pair already exists.
#[allow(clippy::too_many_arguments)]
pub async fn run_with_snapshot(
    input: &str,
    output_dir: &Path,
    info_hash: &str,
    plan: &HLSPlan,
    cfg: &GatewayConfig,
    cancel: tokio_util::sync::CancellationToken,
    store: Arc<dyn ObjectStore>,
    bytes_served: Arc<BytesServedCounter>,
    snapshot_download_ratio: f64,
) -> Result<()> {
    let key = marker_key(info_hash, &output_dir.to_string_lossy());

    if store.marker_exists(&key).await? {
        info!(%key, "snapshot marker already present; skipping transcode");
        return Ok(());
    }

    let original_len = source_content_length(input).await;

    let transcode_input = input.to_string();
    let transcode_output_dir = output_dir.to_path_buf();
    let transcode_plan = plan.clone();
    let transcode_cfg = cfg.clone();
    let transcode_cancel = cancel.clone();

    let transcode_handle = tokio::spawn(async move {
        crate::transcoder::run(&transcode_input, &transcode_output_dir, &transcode_plan, &transcode_cfg, transcode_cancel).await
    });

    ratio::wait_for_ratio(bytes_served, 0, original_len, snapshot_download_ratio).await;
    upload(&*store, &key, output_dir).await?;

    match transcode_handle.await {
        Ok(result) => result,
        Err(e) => Err(Error::Other(format!("transcoder task panicked: {e}"))),
    }
}

async fn upload(store: &dyn ObjectStore, key: &str, output_dir: &Path) -> Result<()> {
    info!(%key, output_dir = %output_dir.display(), "uploading output directory for snapshot");
    store.put_dir(key, output_dir).await?;
    store.put_marker(key).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::LocalDiskStore;
    use tempfile::tempdir;

    #[test]
    fn marker_key_is_deterministic_and_path_sensitive() {
        assert_eq!(marker_key("abc", "/out/x"), marker_key("abc", "/out/x"));
        assert_ne!(marker_key("abc", "/out/x"), marker_key("abc", "/out/y"));
    }

    #[tokio::test]
    async fn skips_when_marker_already_present() {
        let store_dir = tempdir().unwrap();
        let store = LocalDiskStore::new(store_dir.path());
        let key = marker_key("h", "/out/x");
        store.put_marker(&key).await.unwrap();
        assert!(store.marker_exists(&key).await.unwrap());
    }
}
