//! HLS Planner (C2).
//!
//! `Plan(input, probe, config)` turns a [`ProbeResult`] into an
//! [`HLSPlan`]: the set of output streams to encode, their individual
//! encoder argument blocks, and the master playlist text. Grounded on the
//! original `services/hls.go` (`NewHLS`, `GetFFmpegParams`,
//! `MakeMasterPlaylist`).

pub mod args;
pub mod ladder;

use std::path::Path;

use url::Url;

use crate::config::{GatewayConfig, StreamMode};
use crate::probe::{ProbeResult, Stream};
use crate::{Error, Result};
use ladder::Rendition;

/// `T` component of a stream's on-disk/URI naming (`v`/`a`/`s`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

impl StreamKind {
    pub fn tag(self) -> &'static str {
        match self {
            StreamKind::Video => "v",
            StreamKind::Audio => "a",
            StreamKind::Subtitle => "s",
        }
    }
}

/// One output stream the transcoder will produce a sub-playlist/segments
/// for.
#[derive(Debug, Clone)]
pub struct HLSStream {
    pub index: u32,
    pub kind: StreamKind,
    pub source: Stream,
    pub rendition: Option<Rendition>,
    pub force_transcode: bool,
}

impl HLSStream {
    fn display_name(&self) -> String {
        if let Some(title) = self.source.tags.get("title") {
            return title.clone();
        }
        let kind_label = if self.kind == StreamKind::Subtitle { "Subtitle" } else { "Track" };
        format!("{kind_label} #{}", self.index + 1)
    }

    fn language(&self) -> String {
        self.source.tags.get("language").cloned().unwrap_or_else(|| "eng".to_string())
    }

    /// `#EXT-X-MEDIA` row for this stream (audio/subtitle sibling groups).
    fn master_media_row(&self, is_first_audio: bool) -> String {
        let (media_type, group_id) = match self.kind {
            StreamKind::Audio => ("AUDIO", "audio"),
            StreamKind::Subtitle => ("SUBTITLES", "subtitles"),
            StreamKind::Video => unreachable!("video streams are not alternate-media rows"),
        };
        let extra = if is_first_audio { ",AUTOSELECT=YES,DEFAULT=YES" } else { "" };
        format!(
            "#EXT-X-MEDIA:TYPE={media_type},GROUP-ID=\"{group_id}\",LANGUAGE=\"{}\",NAME=\"{}\"{extra},URI=\"{}\"",
            self.language(),
            self.display_name(),
            self.playlist_name(),
        )
    }
}

/// Product of planning: ordered output streams plus the rendered master
/// playlist text.
#[derive(Debug, Clone)]
pub struct HLSPlan {
    pub primary: Vec<HLSStream>,
    pub audio: Vec<HLSStream>,
    pub subs: Vec<HLSStream>,
    pub master_playlist: String,
}

impl HLSPlan {
    /// All output streams in the order the encoder should be invoked for
    /// them, matching the original `GetFFmpegParams` ordering
    /// (primary, then audio, then subtitles).
    pub fn all_streams(&self) -> impl Iterator<Item = &HLSStream> {
        self.primary.iter().chain(self.audio.iter()).chain(self.subs.iter())
    }

    /// Full `ffmpeg`-style argument vector for this plan (§4.2).
    pub fn ffmpeg_args(&self, input: &str, output_dir: &Path, cfg: &GatewayConfig) -> Vec<String> {
        let mut args = vec!["-i".to_string(), input.to_string(), "-xerror".to_string(), "-seekable".to_string(), "1".to_string()];
        for stream in self.all_streams() {
            args.extend(stream.ffmpeg_args(output_dir, &cfg.hls_aac_codec));
        }
        args
    }
}

const EXCLUDED_VIDEO_CODECS: &[&str] = &["mjpeg", "png"];
const EXCLUDED_SUBTITLE_CODEC: &str = "hdmv_pgs_subtitle";

/// Build an [`HLSPlan`] from a probe result, applying the selection rules
/// of §4.2 in order.
pub fn plan(input: &str, probe: &ProbeResult, cfg: &GatewayConfig) -> Result<HLSPlan> {
    // Validate the URL up front; a bare string is otherwise accepted by ffmpeg
    // but rejecting early keeps errors close to their cause.
    Url::parse(input).map_err(|_| Error::InputInvalid)?;

    let mut video: Vec<HLSStream> = Vec::new();
    let mut audio: Vec<HLSStream> = Vec::new();
    let mut subs: Vec<HLSStream> = Vec::new();

    let mut video_taken = false;
    let mut audio_index = 0u32;
    let mut subtitle_index = 0u32;

    for stream in &probe.streams {
        if stream.is_video() && !EXCLUDED_VIDEO_CODECS.contains(&stream.codec_name.as_str()) && !video_taken {
            if stream.height > 1080 {
                return Err(Error::PlanRejected(format!(
                    "resolution over 1080p is not supported (got {}p)",
                    stream.height
                )));
            }
            if cfg.reject_hevc && stream.codec_name == "hevc" {
                return Err(Error::PlanRejected("hevc codec is not supported".to_string()));
            }

            match cfg.stream_mode {
                StreamMode::Online => {
                    let rate_kbps = ladder::rate_for_height(stream.height);
                    video.push(HLSStream {
                        index: 0,
                        kind: StreamKind::Video,
                        source: stream.clone(),
                        rendition: Some(Rendition { height: stream.height, default_rate_kbps: rate_kbps, required: false }),
                        force_transcode: cfg.force_transcode,
                    });
                }
                StreamMode::Multibitrate => {
                    for rung in ladder::renditions_for(stream.height) {
                        video.push(HLSStream {
                            index: 0,
                            kind: StreamKind::Video,
                            source: stream.clone(),
                            rendition: Some(rung),
                            force_transcode: true,
                        });
                    }
                }
            }
            video_taken = true;
        } else if stream.is_audio() {
            audio.push(HLSStream {
                index: audio_index,
                kind: StreamKind::Audio,
                source: stream.clone(),
                rendition: None,
                force_transcode: false,
            });
            audio_index += 1;
        } else if stream.is_subtitle() && stream.codec_name != EXCLUDED_SUBTITLE_CODEC {
            subs.push(HLSStream {
                index: subtitle_index,
                kind: StreamKind::Subtitle,
                source: stream.clone(),
                rendition: None,
                force_transcode: false,
            });
            subtitle_index += 1;
        }
    }

    let (primary, audio, subs) = if !video.is_empty() {
        (video, audio, subs)
    } else if !audio.is_empty() {
        (vec![audio[0].clone()], Vec::new(), Vec::new())
    } else {
        return Err(Error::PlanRejected("source has no usable video or audio stream".to_string()));
    };

    let master_playlist = render_master_playlist(&primary, &audio, &subs);

    Ok(HLSPlan { primary, audio, subs, master_playlist })
}

/// Render the master playlist text (§4.2 "Master playlist emission").
fn render_master_playlist(primary: &[HLSStream], audio: &[HLSStream], subs: &[HLSStream]) -> String {
    let mut out = String::from("#EXTM3U\n");

    for (i, stream) in audio.iter().enumerate() {
        out.push_str(&stream.master_media_row(i == 0));
        out.push('\n');
    }
    for stream in subs {
        out.push_str(&stream.master_media_row(false));
        out.push('\n');
    }

    for stream in primary {
        let rate_kbps = stream.rendition.map(|r| r.default_rate_kbps.max(1)).unwrap_or(1);
        let bandwidth = rate_kbps as u64 * 1000;
        out.push_str(&format!(
            "#EXT-X-STREAM-INF:PROGRAM-ID=1,BANDWIDTH={bandwidth},CODECS=\"avc1.42e00a,mp4a.40.2\""
        ));
        if !audio.is_empty() {
            out.push_str(",AUDIO=\"audio\"");
        }
        if !subs.is_empty() {
            out.push_str(",SUBTITLES=\"subtitles\"");
        }
        out.push('\n');
        out.push_str(&stream.playlist_name());
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::probe::Format;
    use clap::Parser;
    use std::collections::HashMap;

    fn cfg(mode: StreamMode) -> GatewayConfig {
        let mut cfg = GatewayConfig::parse_from(["streamgate"]);
        cfg.stream_mode = mode;
        cfg
    }

    fn video(height: u32, codec: &str) -> Stream {
        Stream { index: 0, codec_type: "video".into(), codec_name: codec.into(), height, channels: 0, tags: HashMap::new() }
    }

    fn audio(codec: &str, channels: u32) -> Stream {
        Stream { index: 1, codec_type: "audio".into(), codec_name: codec.into(), height: 0, channels, tags: HashMap::new() }
    }

    #[test]
    fn rejects_video_above_1080p() {
        let probe = ProbeResult { format: Format::default(), streams: vec![video(1440, "h264")] };
        let err = plan("http://host/a.mp4", &probe, &cfg(StreamMode::Online)).unwrap_err();
        assert!(matches!(err, Error::PlanRejected(_)));
    }

    #[test]
    fn online_mode_emits_single_primary_rendition() {
        let probe = ProbeResult {
            format: Format::default(),
            streams: vec![video(720, "h264"), audio("aac", 2)],
        };
        let result = plan("http://host/a.mp4", &probe, &cfg(StreamMode::Online)).unwrap();
        assert_eq!(result.primary.len(), 1);
        assert_eq!(result.primary[0].playlist_name(), "v0-720.m3u8");
    }

    #[test]
    fn multibitrate_mode_expands_full_ladder() {
        let probe = ProbeResult {
            format: Format::default(),
            streams: vec![video(1080, "h264"), audio("aac", 2)],
        };
        let result = plan("http://host/a.mp4", &probe, &cfg(StreamMode::Multibitrate)).unwrap();
        let heights: Vec<u32> = result.primary.iter().filter_map(|s| s.rendition.map(|r| r.height)).collect();
        assert_eq!(heights, vec![240, 360, 480, 720, 1080]);
    }

    #[test]
    fn master_playlist_has_autoselect_default_on_first_audio_only() {
        let probe = ProbeResult {
            format: Format::default(),
            streams: vec![video(720, "h264"), audio("aac", 2), audio("aac", 2)],
        };
        let result = plan("http://host/a.mp4", &probe, &cfg(StreamMode::Online)).unwrap();
        let lines: Vec<&str> = result.master_playlist.lines().collect();
        assert!(lines[1].contains("AUTOSELECT=YES,DEFAULT=YES"));
        assert!(!lines[2].contains("AUTOSELECT"));
    }

    #[test]
    fn audio_only_source_discards_audio_and_subtitle_siblings() {
        let probe = ProbeResult { format: Format::default(), streams: vec![audio("aac", 2)] };
        let result = plan("http://host/a.mp4", &probe, &cfg(StreamMode::Online)).unwrap();
        assert_eq!(result.primary.len(), 1);
        assert!(result.audio.is_empty());
    }
}
