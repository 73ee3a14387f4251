use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// S3 connection settings shared by every bucket the job touches
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Custom endpoint (MinIO, LocalStack); `None` means AWS
    pub endpoint: Option<String>,
    /// Region override; `None` defers to the AWS provider chain
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("S3_ENDPOINT").ok(),
            region: env::var("S3_REGION").ok(),
            access_key: env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .ok(),
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .ok(),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    pub fn for_minio(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: Some(DEFAULT_S3_REGION.to_string()),
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            path_style: true,
        }
    }

    /// Static credentials are used only when both halves are present
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

// Keep secrets out of logs
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key.as_ref().map(|_| "***"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_minio() {
        let config = StorageConfig::for_minio("http://localhost:9000");
        assert_eq!(config.endpoint, Some("http://localhost:9000".to_string()));
        assert!(config.path_style);
        assert_eq!(config.static_credentials(), Some(("minioadmin", "minioadmin")));
    }

    #[test]
    fn test_partial_credentials_are_ignored() {
        let config = StorageConfig {
            access_key: Some("AKIA".to_string()),
            ..Default::default()
        };
        assert_eq!(config.static_credentials(), None);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = StorageConfig::for_minio("http://localhost:9000");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("minioadmin"));
        assert!(rendered.contains("***"));
    }
}
