//! Completion verification (§4.3): a sub-playlist is *finished* iff it
//! exists, ends with `#EXT-X-ENDLIST`, and every segment line it references
//! names a file that exists on disk.

use std::path::Path;

use crate::planner::HLSPlan;

/// Check every sub-playlist named by `plan` for completion.
pub fn all_finished(output_dir: &Path, plan: &HLSPlan) -> bool {
    plan.all_streams().all(|stream| {
        is_playlist_finished(&output_dir.join(stream.playlist_name()))
    })
}

fn is_playlist_finished(playlist_path: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(playlist_path) else {
        return false;
    };

    let Some(dir) = playlist_path.parent() else {
        return false;
    };

    let mut saw_endlist = false;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "#EXT-X-ENDLIST" {
            saw_endlist = true;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        if !dir.join(line).exists() {
            return false;
        }
    }

    saw_endlist
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_playlist_is_not_finished() {
        let dir = tempdir().unwrap();
        assert!(!is_playlist_finished(&dir.path().join("v0.m3u8")));
    }

    #[test]
    fn playlist_without_endlist_is_not_finished() {
        let dir = tempdir().unwrap();
        let playlist = dir.path().join("v0.m3u8");
        std::fs::write(dir.path().join("v0-0.ts"), b"data").unwrap();
        std::fs::write(&playlist, "#EXTM3U\n#EXTINF:4,\nv0-0.ts\n").unwrap();
        assert!(!is_playlist_finished(&playlist));
    }

    #[test]
    fn playlist_referencing_missing_segment_is_not_finished() {
        let dir = tempdir().unwrap();
        let playlist = dir.path().join("v0.m3u8");
        std::fs::write(&playlist, "#EXTM3U\n#EXTINF:4,\nv0-0.ts\n#EXT-X-ENDLIST\n").unwrap();
        assert!(!is_playlist_finished(&playlist));
    }

    #[test]
    fn complete_playlist_is_finished() {
        let dir = tempdir().unwrap();
        let playlist = dir.path().join("v0.m3u8");
        std::fs::write(dir.path().join("v0-0.ts"), b"data").unwrap();
        std::fs::write(&playlist, "#EXTM3U\n#EXTINF:4,\nv0-0.ts\n#EXT-X-ENDLIST\n").unwrap();
        assert!(is_playlist_finished(&playlist));
    }
}
