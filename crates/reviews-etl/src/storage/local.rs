use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use super::{calculate_sha256, ObjectEntry, ObjectStore, UploadResult};

/// Directory-backed store; keys are `/`-separated paths relative to `root`
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(segments.join("/"))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn uri(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let start = self.path_for(prefix);
        let mut entries = Vec::new();

        if !tokio::fs::try_exists(&start).await.unwrap_or(false) {
            debug!("{} does not exist, nothing to list", start.display());
            return Ok(entries);
        }

        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut reader = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("Failed to read directory {}", dir.display()))?;

            while let Some(entry) = reader
                .next_entry()
                .await
                .with_context(|| format!("Failed to read entry in {}", dir.display()))?
            {
                let path = entry.path();
                let metadata = entry
                    .metadata()
                    .await
                    .with_context(|| format!("Failed to stat {}", path.display()))?;

                if metadata.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.key_for(&path) {
                    entries.push(ObjectEntry {
                        key,
                        size: metadata.len() as i64,
                    });
                }
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    #[instrument(skip(self, data, _content_type), fields(root = %self.root.display()))]
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: Option<String>,
    ) -> Result<UploadResult> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let checksum = calculate_sha256(&data);
        let size = data.len() as i64;

        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!("Wrote {} bytes to {}", size, path.display());

        Ok(UploadResult {
            key: key.to_string(),
            checksum,
            size,
        })
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to delete {}", path.display()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_list_download_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        store.upload("b/nested/two.csv", b"2".to_vec(), None).await.unwrap();
        let result = store
            .upload("a.csv", b"one".to_vec(), Some("text/csv".to_string()))
            .await
            .unwrap();
        assert_eq!(result.size, 3);

        let entries = store.list("").await.unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a.csv", "b/nested/two.csv"]);

        let nested = store.list("b/").await.unwrap();
        assert_eq!(nested.len(), 1);

        assert_eq!(store.download("a.csv").await.unwrap(), b"one");

        store.delete("a.csv").await.unwrap();
        assert_eq!(store.list("").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("not-created-yet"));
        assert!(store.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let err = store.download("missing.csv").await.unwrap_err();
        assert!(format!("{:#}", err).contains("missing.csv"));
    }
}
