//! Gateway configuration.
//!
//! `GatewayConfig` gathers every knob in the Configuration surface (spec
//! §6) behind `clap`'s derive API, with environment-variable fallback in
//! the same shape as the teacher's `ApiServerConfig::from_env_or_default`.

use std::time::Duration;

use clap::Parser;

/// HLS streaming mode: one rendition per source video stream, or a full
/// multi-bitrate ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Default)]
pub enum StreamMode {
    /// Single rendition at the source height (pass-through when already h264).
    #[default]
    Online,
    /// Full ladder expansion (see planner::ladder).
    Multibitrate,
}

/// Gateway-wide configuration, assembled from CLI flags / environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "streamgate", about = "On-demand HLS streaming gateway")]
pub struct GatewayConfig {
    /// Source media URL. May also be supplied per-request via `X-Source-Url`
    /// or the `source_url` query parameter; this flag only sets a default.
    #[arg(long, env = "STREAMGATE_INPUT")]
    pub input: Option<String>,

    /// Base output path. May end in `*` for sharding across sibling mounts
    /// (see distributor::WorkDirDistributor).
    #[arg(long, env = "STREAMGATE_OUTPUT", default_value = "./output")]
    pub output: String,

    /// HTTP bind host.
    #[arg(long, env = "STREAMGATE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP bind port.
    #[arg(long, env = "STREAMGATE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Idle-expiry grace duration, in seconds.
    #[arg(long, env = "STREAMGATE_GRACE_SECS", default_value_t = 300)]
    pub grace_secs: u64,

    /// Enable the bundled `/player/` route.
    #[arg(long, env = "STREAMGATE_PLAYER", default_value_t = false)]
    pub player: bool,

    /// Remote probe host (gRPC). When unset, probing falls back to a local
    /// `ffprobe`-style executable.
    #[arg(long, env = "STREAMGATE_PROBE_HOST")]
    pub probe_host: Option<String>,

    /// Remote probe port.
    #[arg(long, env = "STREAMGATE_PROBE_PORT", default_value_t = 50051)]
    pub probe_port: u16,

    /// Remote probe RPC timeout, in seconds.
    #[arg(long, env = "STREAMGATE_PROBE_TIMEOUT_SECS", default_value_t = 10)]
    pub probe_timeout_secs: u64,

    /// Local probe executable (used when `probe_host` is unset).
    #[arg(long, env = "STREAMGATE_PROBE_EXEC", default_value = "ffprobe")]
    pub probe_exec: String,

    /// Encoder executable.
    #[arg(long, env = "STREAMGATE_ENCODER_EXEC", default_value = "ffmpeg")]
    pub encoder_exec: String,

    /// `online` (single rendition) or `multibitrate` (full ladder).
    #[arg(long, env = "STREAMGATE_STREAM_MODE", value_enum, default_value_t = StreamMode::Online)]
    pub stream_mode: StreamMode,

    /// Keep driving the transcoder to completion even after idle expiry.
    #[arg(long, env = "STREAMGATE_TO_COMPLETION", default_value_t = false)]
    pub to_completion: bool,

    /// Seconds to wait for external pickup after writing `done`/`error`.
    #[arg(long, env = "STREAMGATE_STATUS_EXPIRE_SECS", default_value_t = 30)]
    pub status_expire_secs: u64,

    /// Always transcode, skipping the codec-copy fast path.
    #[arg(long, env = "STREAMGATE_FORCE_TRANSCODE", default_value_t = false)]
    pub force_transcode: bool,

    /// AAC encoder library name.
    #[arg(long, env = "STREAMGATE_HLS_AAC_CODEC", default_value = "libfdk_aac")]
    pub hls_aac_codec: String,

    /// Reject HEVC video sources at plan time (Open Question in spec §9).
    #[arg(long, env = "STREAMGATE_REJECT_HEVC", default_value_t = true)]
    pub reject_hevc: bool,
}

impl GatewayConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    pub fn status_expire(&self) -> Duration {
        Duration::from_secs(self.status_expire_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Parse from `std::env::args`, falling back to defaults per-field when a
    /// flag is absent (clap + `env` attribute already covers env-var
    /// fallback; this is the `.env`-aware entry point used by `main`).
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }
}
