//! Lifecycle Orchestrator (C8, §4.8).
//!
//! Binds the HTTP gateway to a listener and races it against the idle
//! expiry governor (C7) and OS signals, in the spirit of the teacher's
//! `main.rs` signal-select and `ApiServer::run`'s graceful-shutdown
//! pattern. Terminal markers (`error`/`error.log`) for a failed transcode
//! are written here rather than in `gateway`, keeping the "fatal error →
//! marker → statusExpire wait" policy (§4.8) in one place regardless of
//! which job directory triggered it.

use std::future::IntoFuture;
use std::path::Path;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::gateway::{self, AppState};
use crate::{Error, Result};

const ERROR_MARKER: &str = "error";
const ERROR_LOG: &str = "error.log";

/// Record a fatal transcoder failure for `output_dir` (§4.8, §7
/// `SubprocessFailed` / `IncompleteOutput`): write `error.log` with the
/// failure message, then create the empty `error` marker.
pub async fn record_transcode_failure(output_dir: &Path, message: &str) {
    warn!(output_dir = %output_dir.display(), error = %message, "transcoder failed; writing terminal markers");

    if let Err(e) = tokio::fs::write(output_dir.join(ERROR_LOG), message.as_bytes()).await {
        warn!(error = %e, "failed to write error.log");
    }
    if let Err(e) = tokio::fs::write(output_dir.join(ERROR_MARKER), b"").await {
        warn!(error = %e, "failed to write error marker");
    }
}

/// Run the gateway to completion: serve until an OS signal arrives or the
/// idle-expiry governor fires, then wait `status_expire` before returning
/// (§4.8's "wait up to statusExpire for an external signal or timeout").
pub async fn run(cfg: GatewayConfig) -> Result<()> {
    let addr = format!("{}:{}", cfg.host, cfg.port);
    let status_expire = cfg.status_expire();
    let to_completion = cfg.to_completion;
    let state = AppState::new(cfg);
    let idle = state.idle.clone();
    let active_transcodes = state.active_transcodes.clone();

    let listener = TcpListener::bind(&addr).await.map_err(|e| Error::io_path("binding listener", Path::new(&addr), e))?;
    info!(%addr, "streamgate listening");

    let router = gateway::router(state);

    let mut idle_triggered = false;
    let shutdown_reason = tokio::select! {
        result = axum::serve(listener, router).into_future() => {
            if let Err(e) = result {
                warn!(error = %e, "HTTP server exited with an error");
            }
            "server exited"
        }
        _ = idle.expired() => {
            idle_triggered = true;
            info!("idle expiry grace period elapsed with no activity; shutting down");
            "idle expiry"
        }
        _ = signal_shutdown() => {
            info!("shutdown signal received");
            "signal"
        }
    };

    // §4.7/§4.8 to-completion mode: idle expiry stops the HTTP listener but
    // must not let the process exit out from under an in-flight transcode.
    // Wait for it to finish (and write its own `done` marker) before the
    // status-expire wait below.
    if idle_triggered && to_completion {
        info!("to-completion enabled; waiting for the in-flight transcoder to finish before shutting down");
        active_transcodes.wait_for_drain().await;
    }

    info!(reason = shutdown_reason, wait = ?status_expire, "entering post-shutdown status-expire window");
    tokio::time::sleep(status_expire_cap(status_expire)).await;

    Ok(())
}

/// Cap the post-shutdown wait so tests (and pathological configs) never
/// block indefinitely; production `status_expire` values are well under
/// this.
fn status_expire_cap(status_expire: Duration) -> Duration {
    status_expire.min(Duration::from_secs(24 * 60 * 60))
}

#[cfg(unix)]
async fn signal_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn signal_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn records_failure_markers() {
        let dir = tempdir().unwrap();
        record_transcode_failure(dir.path(), "boom").await;
        assert!(dir.path().join(ERROR_MARKER).exists());
        let log = tokio::fs::read_to_string(dir.path().join(ERROR_LOG)).await.unwrap();
        assert_eq!(log, "boom");
    }
}
