//! Work-Directory Distributor (C9, §4.9).
//!
//! `GetDir(location, hash)` turns a configured location pattern and a
//! content hash into a concrete output directory. A `location` ending in
//! `*` sprays jobs across sibling directories that share its last path
//! segment as a prefix, sharded by the hash; anything else is used as a
//! plain base directory. Grounded on the original `services.GetDir` /
//! `services.DistributeByHash`.

use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

use crate::utils::fs::io_error;
use crate::Result;

/// SHA-1 hex digest of `input`, used both as the output subdirectory name
/// and as the sharding key.
pub fn hash_of(input: &str) -> String {
    let digest = Sha1::digest(input.as_bytes());
    hex::encode(digest)
}

/// SHA-1 hex digest of a source URL's **path component** (§4.1, §4.6 step
/// 1: "Hash its path component"), so two URLs differing only in query
/// string (e.g. an auth token) land on the same output directory. Falls
/// back to hashing the whole string when `source_url` doesn't parse as a
/// URL.
pub fn hash_of_source(source_url: &str) -> String {
    match url::Url::parse(source_url) {
        Ok(parsed) => hash_of(parsed.path()),
        Err(_) => hash_of(source_url),
    }
}

/// Resolve `location` (may end in `*`) plus `hash` into a concrete output
/// directory, per §4.9.
pub async fn get_dir(location: &str, hash: &str) -> Result<PathBuf> {
    let Some(prefix) = location.strip_suffix('*') else {
        return Ok(Path::new(location).join(hash));
    };

    let prefix_path = Path::new(prefix);
    let parent = prefix_path.parent().unwrap_or(Path::new(""));
    let leaf_prefix = prefix_path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    let mut siblings = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(parent).await {
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error("reading distributor siblings", parent, e))? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(leaf_prefix) {
                    siblings.push(name.to_string());
                }
            }
        }
    }

    match siblings.len() {
        0 => Ok(prefix_path.join(hash)),
        1 => Ok(parent.join(&siblings[0]).join(hash)),
        _ => {
            let chosen = distribute_by_hash(&siblings, hash);
            Ok(parent.join(chosen).join(hash))
        }
    }
}

/// Map `hash` onto one of `dirs` (sorted lexicographically), bucketing the
/// first 5 hex nibbles of its SHA-1 digest into `dirs.len()` equal
/// intervals over `0x00000·1000 .. 0xFFFFF·1000`.
fn distribute_by_hash(dirs: &[String], hash: &str) -> String {
    let mut sorted = dirs.to_vec();
    sorted.sort();

    let digest = hex::encode(Sha1::digest(hash.as_bytes()));
    let nibbles = &digest[0..5];
    let num = i64::from_str_radix(nibbles, 16).expect("5 hex nibbles always parse") * 1000;

    const TOTAL: i64 = 1_048_575 * 1000;
    let interval = TOTAL / sorted.len() as i64;

    for (i, dir) in sorted.iter().enumerate() {
        if num < (i as i64 + 1) * interval {
            return dir.clone();
        }
    }
    sorted.last().cloned().expect("dirs is non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn plain_location_appends_hash() {
        let dir = get_dir("/var/output", "abc123").await.unwrap();
        assert_eq!(dir, PathBuf::from("/var/output/abc123"));
    }

    #[tokio::test]
    async fn starred_location_with_no_siblings_uses_prefix() {
        let root = tempdir().unwrap();
        let pattern = format!("{}/mnt*", root.path().display());
        let dir = get_dir(&pattern, "abc123").await.unwrap();
        assert_eq!(dir, root.path().join("mnt").join("abc123"));
    }

    #[tokio::test]
    async fn starred_location_with_one_sibling_uses_it() {
        let root = tempdir().unwrap();
        tokio::fs::create_dir(root.path().join("mnt-a")).await.unwrap();
        let pattern = format!("{}/mnt*", root.path().display());
        let dir = get_dir(&pattern, "abc123").await.unwrap();
        assert_eq!(dir, root.path().join("mnt-a").join("abc123"));
    }

    #[tokio::test]
    async fn distribution_is_stable_for_fixed_siblings_and_hash() {
        let root = tempdir().unwrap();
        tokio::fs::create_dir(root.path().join("mnt-a")).await.unwrap();
        tokio::fs::create_dir(root.path().join("mnt-b")).await.unwrap();
        tokio::fs::create_dir(root.path().join("mnt-c")).await.unwrap();
        let pattern = format!("{}/mnt*", root.path().display());

        let first = get_dir(&pattern, "stable-hash").await.unwrap();
        let second = get_dir(&pattern, "stable-hash").await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn distribute_by_hash_picks_one_of_the_dirs() {
        let dirs = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let chosen = distribute_by_hash(&dirs, "some-hash");
        assert!(dirs.contains(&chosen));
    }

    #[test]
    fn hash_of_is_deterministic() {
        assert_eq!(hash_of("http://host/a.mp4"), hash_of("http://host/a.mp4"));
        assert_ne!(hash_of("http://host/a.mp4"), hash_of("http://host/b.mp4"));
    }

    #[test]
    fn hash_of_source_ignores_query_string() {
        let with_query = hash_of_source("http://host/a.mp4?token=X");
        let without_query = hash_of_source("http://host/a.mp4");
        assert_eq!(with_query, without_query);
    }

    #[test]
    fn hash_of_source_falls_back_for_unparseable_input() {
        assert_eq!(hash_of_source("not a url"), hash_of("not a url"));
    }
}
