//! Artifact stores: where rendered files land.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{RenderError, RenderResult};

/// Write target for rendered artifacts, addressed by flat file name
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store bytes under `name`, replacing any previous artifact; returns
    /// the location recorded on the artifact
    async fn put(&self, name: &str, bytes: Vec<u8>) -> RenderResult<String>;

    /// Read an artifact back
    async fn get(&self, name: &str) -> RenderResult<Vec<u8>>;

    /// Whether an artifact exists
    async fn contains(&self, name: &str) -> RenderResult<bool>;

    /// Delete an artifact; `false` if it did not exist
    async fn delete(&self, name: &str) -> RenderResult<bool>;
}

fn check_name(name: &str) -> RenderResult<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0');
    if valid {
        Ok(())
    } else {
        Err(RenderError::InvalidName(name.to_string()))
    }
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of stored artifacts
    pub artifact_count: usize,
    /// Total bytes stored
    pub total_bytes: u64,
    /// Number of writes
    pub write_count: u64,
}

/// In-memory artifact store
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Vec<u8>>>,
    stats: RwLock<StoreStats>,
}

impl MemoryArtifactStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get store statistics
    pub async fn stats(&self) -> StoreStats {
        self.stats.read().await.clone()
    }

    /// Names of all stored artifacts, sorted
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.artifacts.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> RenderResult<String> {
        check_name(name)?;
        let size = bytes.len() as u64;

        let mut artifacts = self.artifacts.write().await;
        let previous = artifacts.insert(name.to_string(), bytes);

        let mut stats = self.stats.write().await;
        if let Some(previous) = previous {
            stats.total_bytes -= previous.len() as u64;
        } else {
            stats.artifact_count += 1;
        }
        stats.total_bytes += size;
        stats.write_count += 1;

        Ok(format!("memory://{}", name))
    }

    async fn get(&self, name: &str) -> RenderResult<Vec<u8>> {
        self.artifacts
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RenderError::NotFound(name.to_string()))
    }

    async fn contains(&self, name: &str) -> RenderResult<bool> {
        Ok(self.artifacts.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> RenderResult<bool> {
        let mut artifacts = self.artifacts.write().await;
        match artifacts.remove(name) {
            Some(bytes) => {
                let mut stats = self.stats.write().await;
                stats.artifact_count -= 1;
                stats.total_bytes -= bytes.len() as u64;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Artifact store backed by a directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    /// Open a store rooted at `dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if directory creation fails
    pub async fn open(dir: impl Into<PathBuf>) -> RenderResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn artifact_path(&self, name: &str) -> RenderResult<PathBuf> {
        check_name(name)?;
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> RenderResult<String> {
        let path = self.artifact_path(name)?;
        // Write beside the target then rename, so readers never see a partial file
        let tmp = self.dir.join(format!(".{}.tmp", name));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(path.display().to_string())
    }

    async fn get(&self, name: &str) -> RenderResult<Vec<u8>> {
        let path = self.artifact_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RenderError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn contains(&self, name: &str) -> RenderResult<bool> {
        let path = self.artifact_path(name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn delete(&self, name: &str) -> RenderResult<bool> {
        let path = self.artifact_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_get() {
        let store = MemoryArtifactStore::new();
        let location = store.put("a.csv", b"x,y\n".to_vec()).await.unwrap();
        assert_eq!(location, "memory://a.csv");
        assert_eq!(store.get("a.csv").await.unwrap(), b"x,y\n");
        assert!(store.contains("a.csv").await.unwrap());
        assert_eq!(store.list().await, vec!["a.csv".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_stats_on_replace_and_delete() {
        let store = MemoryArtifactStore::new();
        store.put("a", vec![0; 4]).await.unwrap();
        store.put("a", vec![0; 10]).await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.artifact_count, 1);
        assert_eq!(stats.total_bytes, 10);
        assert_eq!(stats.write_count, 2);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.stats().await.total_bytes, 0);
    }

    #[tokio::test]
    async fn test_memory_missing() {
        let store = MemoryArtifactStore::new();
        assert!(matches!(store.get("nope").await, Err(RenderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_path_names() {
        let store = MemoryArtifactStore::new();
        for name in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                store.put(name, Vec::new()).await,
                Err(RenderError::InvalidName(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::open(dir.path().join("artifacts")).await.unwrap();

        let location = store.put("report_1.json", b"[]".to_vec()).await.unwrap();
        assert!(location.ends_with("report_1.json"));
        assert_eq!(store.get("report_1.json").await.unwrap(), b"[]");
        assert!(store.contains("report_1.json").await.unwrap());

        assert!(store.delete("report_1.json").await.unwrap());
        assert!(!store.contains("report_1.json").await.unwrap());
        assert!(matches!(
            store.get("report_1.json").await,
            Err(RenderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::open(dir.path()).await.unwrap();
        assert!(store.put("../escape", Vec::new()).await.is_err());
    }
}
