//! Run session
//!
//! One [`EtlSession`] is built per run and passed explicitly to every stage.
//! It owns the S3 client (when any location needs one), the run id used to
//! name output files, and a catalog of named in-memory views that the
//! analytics queries resolve by name.

use aws_sdk_s3::Client;
use reviews_common::{EtlError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::JobConfig;
use crate::location::Location;
use crate::storage::{s3, LocalStore, ObjectEntry, ObjectStore, S3Store, UploadResult};
use crate::transform::CleanedReview;

/// Name the cleaned dataset is registered under
pub const REVIEWS_VIEW: &str = "product_reviews";

pub type ReviewView = Arc<Vec<CleanedReview>>;

pub struct EtlSession {
    run_id: Uuid,
    s3_client: Option<Client>,
    views: HashMap<String, ReviewView>,
}

impl EtlSession {
    pub fn new(s3_client: Option<Client>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            s3_client,
            views: HashMap::new(),
        }
    }

    /// Build a session for `config`, creating an S3 client only when some
    /// configured location lives in S3
    pub async fn connect(config: &JobConfig) -> Self {
        let client = if config.locations().iter().any(|loc| loc.is_s3()) {
            Some(s3::build_client(&config.storage).await)
        } else {
            None
        };

        let session = Self::new(client);
        info!(run_id = %session.run_id, s3 = session.s3_client.is_some(), "Session started");
        session
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn register_view(&mut self, name: impl Into<String>, rows: ReviewView) {
        let name = name.into();
        debug!(view = %name, rows = rows.len(), "Registered view");
        self.views.insert(name, rows);
    }

    pub fn view(&self, name: &str) -> Result<ReviewView> {
        self.views
            .get(name)
            .cloned()
            .ok_or_else(|| EtlError::ViewNotFound(name.to_string()))
    }

    /// Resolve a location to a store plus key prefix
    pub fn open(&self, location: &Location) -> Result<LocationHandle> {
        let (store, prefix): (Arc<dyn ObjectStore>, String) = match location {
            Location::S3 { bucket, prefix } => {
                let client = self.s3_client.clone().ok_or_else(|| {
                    EtlError::Config(format!("no S3 client configured for {}", location))
                })?;
                (Arc::new(S3Store::new(client, bucket.clone())), prefix.clone())
            },
            Location::Local { path } => (Arc::new(LocalStore::new(path.clone())), String::new()),
        };

        Ok(LocationHandle {
            store,
            prefix,
            location: location.clone(),
        })
    }
}

/// A location bound to its backing store
#[derive(Clone)]
pub struct LocationHandle {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    location: Location,
}

impl LocationHandle {
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn uri(&self, key: &str) -> String {
        self.store.uri(key)
    }

    /// Every object under the location, recursively
    pub async fn list_files(&self) -> Result<Vec<ObjectEntry>> {
        Ok(self.store.list(&self.prefix).await?)
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>> {
        Ok(self.store.download(key).await?)
    }

    /// Write `name` directly beneath the location
    pub async fn write(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<UploadResult> {
        let key = format!("{}{}", self.prefix, name);
        Ok(self.store.upload(&key, data, content_type).await?)
    }

    /// Delete everything under the location; returns the number of objects removed
    #[instrument(skip(self), fields(location = %self.location))]
    pub async fn clear(&self) -> Result<usize> {
        let entries = self.store.list(&self.prefix).await?;
        for entry in &entries {
            self.store.delete(&entry.key).await?;
        }
        if !entries.is_empty() {
            debug!(removed = entries.len(), "Cleared existing output");
        }
        Ok(entries.len())
    }
}
