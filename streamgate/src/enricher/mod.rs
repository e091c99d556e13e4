//! Playlist Enricher (C5, §4.5).
//!
//! Applied to sub-playlist bodies (never the master `index.m3u8`):
//! validates the playlist is well-formed HLS, rewrites segment URIs to
//! propagate a query string, and inserts
//! `#EXT-X-PLAYLIST-TYPE:EVENT` — so downstream clients treat the growing
//! file as a live event stream with any caller-supplied auth/query
//! parameters preserved on every segment URI.

use std::sync::OnceLock;

use regex::Regex;

use crate::{Error, Result};

const MEDIA_SEQUENCE_LINE: &str = "#EXT-X-MEDIA-SEQUENCE:0";
const PLAYLIST_TYPE_EVENT: &str = "#EXT-X-PLAYLIST-TYPE:EVENT";

fn segment_uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[asv][0-9]+(-[0-9]+)?(-[0-9]+)?\.[0-9a-z]{2,4}$").expect("static regex is valid")
    })
}

fn trailer_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(ts|vtt|,)$").expect("static regex is valid"))
}

/// `Validate` (§4.5 step 2), applied only to sub-playlists.
///
/// `Ok(true)` when `#EXT-X-ENDLIST` was seen; `Ok(false)` for a
/// still-growing-but-well-formed playlist; `Err` when a line past the
/// fifth fails the trailer pattern, or fewer than 5 lines were read.
pub fn validate(body: &str) -> Result<bool> {
    let mut ended = false;
    let mut line_count = 0usize;

    for line in body.lines() {
        line_count += 1;
        if line == "#EXT-X-ENDLIST" {
            ended = true;
            continue;
        }
        if line_count > 5 && !line.starts_with('#') && !trailer_pattern().is_match(line) {
            return Err(Error::PlaylistInvalid(format!("line {line_count} fails trailer pattern: {line}")));
        }
    }

    if line_count < 5 {
        return Err(Error::PlaylistInvalid(format!("playlist too short ({line_count} lines)")));
    }

    Ok(ended)
}

/// `Rewrite` (§4.5 step 3): append `?query` to every segment-URI line, and
/// insert `#EXT-X-PLAYLIST-TYPE:EVENT` right after
/// `#EXT-X-MEDIA-SEQUENCE:0`. `query` excludes the leading `?`; pass an
/// empty string when the original request had none.
pub fn rewrite(body: &str, query: &str) -> String {
    let mut out = String::with_capacity(body.len() + 64);

    for line in body.lines() {
        let rewritten = if segment_uri_regex().is_match(line) && !query.is_empty() {
            format!("{line}?{query}")
        } else {
            line.to_string()
        };
        out.push_str(&rewritten);
        out.push('\n');

        if line == MEDIA_SEQUENCE_LINE {
            out.push_str(PLAYLIST_TYPE_EVENT);
            out.push('\n');
        }
    }

    out
}

/// `Enrich`: validate then rewrite, in one call, for use by the gateway's
/// playlist-enrichment middleware step (§4.6 step 6). Returns the
/// rewritten body and whether the playlist had ended.
pub fn enrich(body: &str, query: &str) -> Result<(String, bool)> {
    let ended = validate(body)?;
    Ok((rewrite(body, query), ended))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n#EXT-X-MEDIA-SEQUENCE:0\n#EXTINF:4.0,\nv0-0.ts\n#EXTINF:4.0,\nv0-1.ts\n";

    #[test]
    fn validate_accepts_well_formed_growing_playlist() {
        assert_eq!(validate(SAMPLE).unwrap(), false);
    }

    #[test]
    fn validate_detects_endlist() {
        let body = format!("{SAMPLE}#EXT-X-ENDLIST\n");
        assert!(validate(&body).unwrap());
    }

    #[test]
    fn validate_rejects_too_short_playlist() {
        assert!(validate("#EXTM3U\n").is_err());
    }

    #[test]
    fn validate_rejects_malformed_trailing_line() {
        let body = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n#EXT-X-MEDIA-SEQUENCE:0\n#EXTINF:4.0,\nnot-a-segment-or-comment\n";
        assert!(validate(body).is_err());
    }

    #[test]
    fn rewrite_appends_query_to_segment_lines_only() {
        let out = rewrite(SAMPLE, "token=X");
        assert!(out.contains("v0-0.ts?token=X"));
        assert!(out.contains("v0-1.ts?token=X"));
        assert!(out.contains("#EXTINF:4.0,\n"));
    }

    #[test]
    fn rewrite_inserts_playlist_type_event_after_media_sequence() {
        let out = rewrite(SAMPLE, "");
        let lines: Vec<&str> = out.lines().collect();
        let seq_idx = lines.iter().position(|l| *l == MEDIA_SEQUENCE_LINE).unwrap();
        assert_eq!(lines[seq_idx + 1], PLAYLIST_TYPE_EVENT);
    }

    #[test]
    fn rewrite_without_query_leaves_segment_lines_untouched() {
        let out = rewrite(SAMPLE, "");
        assert!(out.contains("v0-0.ts\n"));
        assert!(!out.contains("v0-0.ts?"));
    }

    #[test]
    fn enrich_round_trips_property_6() {
        let (out, ended) = enrich(SAMPLE, "token=X").unwrap();
        assert!(!ended);
        for line in out.lines() {
            if line.ends_with(".ts") || line.contains(".ts?") {
                assert_eq!(line.matches('?').count(), 1);
            }
        }
    }
}
