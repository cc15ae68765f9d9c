//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Watcher configuration
//! ├── keywords.txt          # One keyword per line
//! ├── seen_bazos.json       # Seen links, one file per site
//! └── seen_vinted.json
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::SeenStore;
use crate::storage::seen::{LoadedSet, SeenLinkSet};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.path(key), bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

/// Write `bytes` to `path` so readers see either the old or the new file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl SeenStore for LocalStorage {
    async fn load(&self, key: &str) -> Result<LoadedSet> {
        match self.read_bytes(key).await? {
            Some(bytes) => SeenLinkSet::from_json(&bytes),
            None => {
                log::info!("No seen-link file at {}, starting empty", self.path(key).display());
                Ok(LoadedSet {
                    set: SeenLinkSet::new(),
                    needs_migration: false,
                })
            }
        }
    }

    async fn save(&self, key: &str, set: &SeenLinkSet) -> Result<()> {
        let bytes = set.to_json()?;
        self.write_bytes(key, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("test.txt.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let loaded = storage.load("seen_bazos.json").await.unwrap();
        assert!(loaded.set.is_empty());
        assert!(!loaded.needs_migration);
    }

    #[tokio::test]
    async fn test_empty_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("seen_bazos.json"), "").unwrap();
        let storage = LocalStorage::new(tmp.path());

        let loaded = storage.load("seen_bazos.json").await.unwrap();
        assert!(loaded.set.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("nested"));

        let set = SeenLinkSet::from_links(["https://x/a", "https://x/b"]);
        storage.save("seen_sbazar.json", &set).await.unwrap();

        let loaded = storage.load("seen_sbazar.json").await.unwrap();
        assert_eq!(loaded.set, set);
    }
}
