//! Object storage backends
//!
//! The pipeline talks to storage through [`ObjectStore`], keyed by
//! `/`-separated object keys. [`s3::S3Store`] serves `s3://` locations and
//! [`local::LocalStore`] serves local directories.

use anyhow::Result;
use async_trait::async_trait;

pub mod config;
pub mod local;
pub mod s3;

pub use config::StorageConfig;
pub use local::LocalStore;
pub use s3::S3Store;

/// A stored object as returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: i64,
}

impl ObjectEntry {
    /// Last path segment of the key
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub key: String,
    pub checksum: String,
    pub size: i64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable URI for `key`, used in logs and errors
    fn uri(&self, key: &str) -> String;

    /// All objects under `prefix`, recursively, sorted by key
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>>;

    async fn download(&self, key: &str) -> Result<Vec<u8>>;

    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<UploadResult>;

    async fn delete(&self, key: &str) -> Result<()>;
}

pub(crate) fn calculate_sha256(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
