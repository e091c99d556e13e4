//! Transcoder argument-vector generation (§4.2 "Per-stream encoder
//! arguments"), grounded on the original `HLSStream.GetFFmpegParams`.

use std::path::Path;

use super::{HLSStream, StreamKind};

impl HLSStream {
    /// Sub-playlist filename, e.g. `v0.m3u8` or `v0-720.m3u8`.
    pub fn playlist_name(&self) -> String {
        match self.rendition {
            Some(r) => format!("{}{}-{}.m3u8", self.kind.tag(), self.index, r.height),
            None => format!("{}{}.m3u8", self.kind.tag(), self.index),
        }
    }

    fn segment_format(&self) -> &'static str {
        match self.kind {
            StreamKind::Subtitle => "webvtt",
            _ => "mpegts",
        }
    }

    fn segment_extension(&self) -> &'static str {
        match self.kind {
            StreamKind::Subtitle => "vtt",
            _ => "ts",
        }
    }

    fn codec_args(&self, aac_codec: &str) -> Vec<String> {
        let mut args = vec![format!("-c:{}", self.kind.tag())];

        match self.kind {
            StreamKind::Video if self.force_transcode || self.source.codec_name != "h264" => {
                let rendition = self.rendition.expect("video streams always carry a rendition");
                let rate = rendition.default_rate_kbps as f64;
                args.extend(
                    [
                        "h264".to_string(),
                        "-vf".to_string(),
                        format!("scale=-2:{}", rendition.height),
                        "-profile:v".to_string(),
                        "high".to_string(),
                        "-preset".to_string(),
                        "veryfast".to_string(),
                        "-g".to_string(),
                        "48".to_string(),
                        "-keyint_min".to_string(),
                        "48".to_string(),
                        "-crf".to_string(),
                        "20".to_string(),
                        "-sc_threshold".to_string(),
                        "0".to_string(),
                        "-b:v".to_string(),
                        format!("{}K", rate as u32),
                        "-maxrate".to_string(),
                        format!("{}K", (rate * 1.3) as u32),
                        "-bufsize".to_string(),
                        format!("{}K", (rate * 1.5) as u32),
                        "-pix_fmt".to_string(),
                        "yuv420p".to_string(),
                    ]
                    .into_iter(),
                );
            }
            StreamKind::Audio if self.source.codec_name != "aac" || self.source.channels > 2 => {
                args.extend([aac_codec.to_string(), "-ac".to_string(), "2".to_string()]);
            }
            StreamKind::Subtitle if self.source.codec_name != "webvtt" => {
                args.push("webvtt".to_string());
            }
            _ => args.push("copy".to_string()),
        }

        args
    }

    /// Segmented output block for this stream (`-map ... <codec args> <pattern>`).
    pub fn ffmpeg_args(&self, output_dir: &Path, aac_codec: &str) -> Vec<String> {
        let playlist_path = output_dir.join(self.playlist_name());

        let mut args = vec![
            "-map".to_string(),
            format!("0:{}:{}", self.kind.tag(), self.index),
            "-f".to_string(),
            "segment".to_string(),
            "-segment_time".to_string(),
            "4".to_string(),
            "-segment_list_type".to_string(),
            "hls".to_string(),
            "-segment_list".to_string(),
            playlist_path.to_string_lossy().replace('\\', "/"),
            "-muxdelay".to_string(),
            "0".to_string(),
            "-segment_format".to_string(),
            self.segment_format().to_string(),
        ];

        args.extend(self.codec_args(aac_codec));

        let pattern = match self.rendition {
            Some(r) => format!(
                "{}-{}-%d.{}",
                output_dir.join(format!("{}{}", self.kind.tag(), self.index)).to_string_lossy(),
                r.height,
                self.segment_extension()
            ),
            None => format!(
                "{}-%d.{}",
                output_dir.join(format!("{}{}", self.kind.tag(), self.index)).to_string_lossy(),
                self.segment_extension()
            ),
        };
        args.push(pattern.replace('\\', "/"));

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ladder::Rendition;
    use crate::probe::Stream;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn video_stream() -> HLSStream {
        HLSStream {
            index: 0,
            kind: StreamKind::Video,
            source: Stream {
                index: 0,
                codec_type: "video".into(),
                codec_name: "hevc".into(),
                height: 720,
                channels: 0,
                tags: HashMap::new(),
            },
            rendition: Some(Rendition { height: 720, default_rate_kbps: 5000, required: false }),
            force_transcode: true,
        }
    }

    #[test]
    fn video_transcode_sets_bitrate_ladder() {
        let stream = video_stream();
        let args = stream.ffmpeg_args(&PathBuf::from("/out"), "libfdk_aac");
        assert!(args.contains(&"-b:v".to_string()));
        let idx = args.iter().position(|a| a == "-b:v").unwrap();
        assert_eq!(args[idx + 1], "5000K");
    }

    #[test]
    fn copy_path_used_when_already_h264() {
        let mut stream = video_stream();
        stream.source.codec_name = "h264".into();
        stream.force_transcode = false;
        let args = stream.codec_args("libfdk_aac");
        assert_eq!(args, vec!["-c:v".to_string(), "copy".to_string()]);
    }

    #[test]
    fn playlist_name_includes_height_for_renditions() {
        assert_eq!(video_stream().playlist_name(), "v0-720.m3u8");
    }
}
