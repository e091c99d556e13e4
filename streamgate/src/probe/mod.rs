//! Probe Client (C1).
//!
//! `Probe(input, outputDir)` obtains a structured description of a source
//! URL: container format duration plus per-stream codec/dimension metadata.
//! `outputDir/index.json` is the on-disk memoization; `cache` layers an
//! in-memory TTL cache with in-flight coalescing on top, modeled on the
//! teacher's `config::cache::ConfigCache`.

pub mod cache;
pub mod local;
pub mod remote;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::{Error, Result};

/// One stream entry reported by the prober.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub index: u32,
    pub codec_type: String,
    pub codec_name: String,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub channels: u32,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl Stream {
    pub fn is_video(&self) -> bool {
        self.codec_type == "video"
    }

    pub fn is_audio(&self) -> bool {
        self.codec_type == "audio"
    }

    pub fn is_subtitle(&self) -> bool {
        self.codec_type == "subtitle"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Format {
    #[serde(default)]
    pub duration: String,
}

/// Structured description of a probed source, serialized at
/// `outputDir/index.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub format: Format,
    pub streams: Vec<Stream>,
}

const INDEX_JSON: &str = "index.json";

/// Probe `input`, memoizing the result at `outputDir/index.json`.
///
/// If the file already exists, it is parsed and returned without invoking
/// either probe backend. Otherwise a remote RPC is used when `probe_host`
/// is configured, falling back to the local probe executable.
pub async fn probe(
    input: &str,
    output_dir: &Path,
    cfg: &GatewayConfig,
) -> Result<ProbeResult> {
    let index_path = output_dir.join(INDEX_JSON);

    if let Ok(bytes) = tokio::fs::read(&index_path).await {
        return serde_json::from_slice(&bytes).map_err(Error::Serialization);
    }

    let result = if let Some(host) = cfg.probe_host.as_deref() {
        remote::probe(host, cfg.probe_port, input, cfg.probe_timeout()).await?
    } else {
        local::probe(&cfg.probe_exec, input, cfg.probe_timeout()).await?
    };

    let bytes = serde_json::to_vec_pretty(&result).map_err(Error::Serialization)?;
    crate::utils::fs::write_atomic(&index_path, &bytes).await?;

    Ok(result)
}

/// Default success/error memoization windows (§4.1).
pub const SUCCESS_TTL: Duration = Duration::from_secs(30 * 60);
pub const ERROR_TTL: Duration = Duration::from_secs(10);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_kind_predicates() {
        let s = Stream {
            index: 0,
            codec_type: "video".into(),
            codec_name: "h264".into(),
            height: 1080,
            channels: 0,
            tags: HashMap::new(),
        };
        assert!(s.is_video());
        assert!(!s.is_audio());
    }

    #[test]
    fn probe_result_roundtrips_through_json() {
        let result = ProbeResult {
            format: Format { duration: "10.0".into() },
            streams: vec![Stream {
                index: 0,
                codec_type: "audio".into(),
                codec_name: "aac".into(),
                height: 0,
                channels: 2,
                tags: HashMap::new(),
            }],
        };
        let encoded = serde_json::to_string(&result).unwrap();
        let decoded: ProbeResult = serde_json::from_str(&encoded).unwrap();
        assert_eq!(result, decoded);
    }
}
