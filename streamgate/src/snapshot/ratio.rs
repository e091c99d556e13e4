//! Download-ratio monitor (§4.10): waits until served-plus-previously-
//! downloaded bytes cross a configured fraction of the source's reported
//! length.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Bytes served to clients so far, incremented by the gateway (behind the
/// `snapshot` feature) as segment responses go out.
#[derive(Default)]
pub struct BytesServedCounter(AtomicU64);

impl BytesServedCounter {
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Block until `(served + previously_downloaded) / original_len` exceeds
/// `ratio`. A zero-length source never crosses the threshold and this
/// returns immediately rather than looping forever.
pub async fn wait_for_ratio(counter: Arc<BytesServedCounter>, previously_downloaded: u64, original_len: u64, ratio: f64) {
    if original_len == 0 {
        return;
    }

    loop {
        let served = counter.get() + previously_downloaded;
        let current = served as f64 / original_len as f64;
        if current > ratio {
            debug!(served, original_len, current, "download ratio threshold crossed");
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_immediately_once_ratio_exceeded() {
        let counter = Arc::new(BytesServedCounter::default());
        counter.add(600);
        wait_for_ratio(counter, 0, 1000, 0.5).await;
    }

    #[tokio::test]
    async fn zero_length_source_never_blocks() {
        let counter = Arc::new(BytesServedCounter::default());
        wait_for_ratio(counter, 0, 0, 0.5).await;
    }

    #[tokio::test]
    async fn previously_downloaded_bytes_count_toward_the_ratio() {
        let counter = Arc::new(BytesServedCounter::default());
        wait_for_ratio(counter, 900, 1000, 0.5).await;
    }
}
