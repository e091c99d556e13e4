//! Object-storage abstraction (§4.10, grounded on `services/s3_storage.go`).
//!
//! Neither the teacher nor a full example repo in the pack carries an S3
//! SDK dependency, and this feature is explicitly secondary, so no vendor
//! SDK is fabricated here: callers plug in whatever object store they
//! have via [`ObjectStore`]. [`LocalDiskStore`] is the only shipped
//! implementation, used by tests and as a reference for a real
//! S3-compatible client.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::Result;

/// The two operations the snapshotter needs: marker existence/creation
/// and whole-directory upload (`HeadObject` / `PutObject` in the Go
/// original).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn marker_exists(&self, key: &str) -> Result<bool>;
    async fn put_marker(&self, key: &str) -> Result<()>;
    async fn put_dir(&self, key_prefix: &str, dir: &Path) -> Result<()>;
}

/// Local-disk stand-in for a real S3-compatible store: markers and
/// uploaded trees both land under `root`.
pub struct LocalDiskStore {
    root: PathBuf,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn marker_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.done"))
    }
}

#[async_trait]
impl ObjectStore for LocalDiskStore {
    async fn marker_exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.marker_path(key)).await.unwrap_or(false))
    }

    async fn put_marker(&self, key: &str) -> Result<()> {
        crate::utils::fs::ensure_dir_all(&self.root).await?;
        let path = self.marker_path(key);
        tokio::fs::write(&path, b"")
            .await
            .map_err(|e| crate::Error::io_path("writing snapshot marker", &path, e))
    }

    async fn put_dir(&self, key_prefix: &str, dir: &Path) -> Result<()> {
        let dest = self.root.join(key_prefix);
        crate::utils::fs::ensure_dir_all(&dest).await?;

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| crate::Error::io_path("reading output dir for snapshot upload", dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| crate::Error::io_path("reading output dir entry", dir, e))?
        {
            if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let bytes = tokio::fs::read(entry.path())
                .await
                .map_err(|e| crate::Error::io_path("reading file to upload", &entry.path(), e))?;
            let dest_path = dest.join(entry.file_name());
            tokio::fs::write(&dest_path, bytes)
                .await
                .map_err(|e| crate::Error::io_path("writing uploaded file", &dest_path, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn marker_round_trips() {
        let root = tempdir().unwrap();
        let store = LocalDiskStore::new(root.path());
        assert!(!store.marker_exists("k").await.unwrap());
        store.put_marker("k").await.unwrap();
        assert!(store.marker_exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn put_dir_copies_files_only() {
        let src = tempdir().unwrap();
        tokio::fs::write(src.path().join("seg.ts"), b"data").await.unwrap();
        tokio::fs::create_dir(src.path().join("sub")).await.unwrap();

        let dest_root = tempdir().unwrap();
        let store = LocalDiskStore::new(dest_root.path());
        store.put_dir("job-1", src.path()).await.unwrap();

        assert!(dest_root.path().join("job-1").join("seg.ts").exists());
        assert!(!dest_root.path().join("job-1").join("sub").exists());
    }
}
