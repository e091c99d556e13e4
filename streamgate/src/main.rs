//! streamgate - on-demand HTTP streaming gateway.
//!
//! Turns a remote media URL into a live-served HLS tree: probes the
//! source, plans a rendition ladder, spawns a transcoder, and serves the
//! resulting playlists and segments as they land on disk.

use streamgate::config::GatewayConfig;
use streamgate::logging::init_logging;
use tracing::{error, info};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = GatewayConfig::load();

    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let (_logging_config, _guard) =
        init_logging(&log_dir).map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    info!("starting streamgate v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = streamgate::orchestrator::run(cfg).await {
        error!(error = %e, "streamgate exited with an error");
        return Err(e.into());
    }

    info!("streamgate shutdown complete");
    Ok(())
}
