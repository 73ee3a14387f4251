use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use tracing::{debug, info, instrument};

use super::config::{StorageConfig, DEFAULT_S3_REGION};
use super::{calculate_sha256, ObjectEntry, ObjectStore, UploadResult};

/// Build one S3 client for the whole run.
///
/// Explicit keys in `config` win; otherwise the default AWS provider chain
/// (environment, profile, instance/task role) supplies credentials.
pub async fn build_client(config: &StorageConfig) -> Client {
    debug!("Initializing S3 client with config: {:?}", config);

    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let Some((access_key, secret_key)) = config.static_credentials() {
        let credentials = Credentials::new(access_key, secret_key, None, None, "reviews-etl");
        loader = loader.credentials_provider(credentials);
    }

    let shared = loader.load().await;

    let mut s3_config_builder =
        aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.path_style);

    if shared.region().is_none() {
        s3_config_builder = s3_config_builder.region(Region::new(DEFAULT_S3_REGION));
    }

    if let Some(endpoint) = &config.endpoint {
        s3_config_builder = s3_config_builder.endpoint_url(endpoint);
    }

    Client::from_conf(s3_config_builder.build())
}

/// One bucket behind the shared client
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        debug!("Listing objects in s3://{}/{}", self.bucket, prefix);

        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .with_context(|| format!("Failed to list s3://{}/{}", self.bucket, prefix))?;

            entries.extend(response.contents().iter().filter_map(|obj| {
                obj.key().filter(|k| !k.ends_with('/')).map(|k| ObjectEntry {
                    key: k.to_string(),
                    size: obj.size().unwrap_or(0),
                })
            }));

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                },
                _ => break,
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        debug!("Found {} objects under s3://{}/{}", entries.len(), self.bucket, prefix);

        Ok(entries)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        debug!("Downloading from s3://{}/{}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to download from S3: {}", key))?;

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);

        Ok(data)
    }

    #[instrument(skip(self, data), fields(bucket = %self.bucket))]
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<UploadResult> {
        let checksum = calculate_sha256(&data);
        let size = data.len() as i64;

        debug!("Uploading {} bytes to s3://{}/{}", size, self.bucket, key);

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .with_context(|| format!("Failed to upload to S3: {}", key))?;

        info!("Uploaded s3://{}/{} ({} bytes)", self.bucket, key, size);

        Ok(UploadResult {
            key: key.to_string(),
            checksum,
            size,
        })
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, key: &str) -> Result<()> {
        debug!("Deleting s3://{}/{}", self.bucket, key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete from S3: {}", key))?;

        Ok(())
    }
}
