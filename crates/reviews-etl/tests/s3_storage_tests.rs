//! S3 integration tests
//!
//! **Requirements**:
//! - MinIO or S3 must be running and accessible
//! - S3_ENDPOINT environment variable must be set (e.g., "http://localhost:9000")
//! - S3_BUCKET names the scratch bucket (default "reviews-etl-test"); it is
//!   created if missing
//! - Tests will be skipped if S3_ENDPOINT is not configured
//!
//! **Running tests**:
//! ```bash
//! S3_ENDPOINT=http://localhost:9000 S3_ACCESS_KEY=minioadmin S3_SECRET_KEY=minioadmin \
//!   S3_PATH_STYLE=true cargo test --test s3_storage_tests
//! ```

use reviews_etl::storage::{s3, ObjectStore, S3Store, StorageConfig};
use reviews_etl::{EtlSession, JobConfig, JobOverrides, Location, ReviewPipeline};
use uuid::Uuid;

/// Setup helper that creates a store if MinIO/S3 is available
async fn setup_store() -> Option<S3Store> {
    if std::env::var("S3_ENDPOINT").is_err() {
        return None;
    }

    let config = StorageConfig::from_env();
    let client = s3::build_client(&config).await;
    let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "reviews-etl-test".to_string());

    // Already-exists errors are fine
    let _ = client.create_bucket().bucket(&bucket).send().await;

    Some(S3Store::new(client, bucket))
}

/// Unique prefix per test so parallel runs do not collide
fn test_prefix(test_name: &str) -> String {
    format!("test/{}/{}/", test_name, Uuid::new_v4())
}

async fn cleanup(store: &S3Store, prefix: &str) {
    if let Ok(entries) = store.list(prefix).await {
        for entry in entries {
            store.delete(&entry.key).await.ok();
        }
    }
}

#[tokio::test]
async fn test_s3_upload_list_download_delete() {
    let Some(store) = setup_store().await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let prefix = test_prefix("roundtrip");
    let key = format!("{}nested/reviews.csv", prefix);
    let data = b"product_id,customer_id\nabc1,c9\n".to_vec();

    let upload = store
        .upload(&key, data.clone(), Some("text/csv".to_string()))
        .await
        .expect("Upload should succeed");
    assert_eq!(upload.key, key);
    assert_eq!(upload.size, data.len() as i64);
    assert_eq!(upload.checksum.len(), 64);

    let entries = store.list(&prefix).await.expect("List should succeed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, key);
    assert_eq!(entries[0].file_name(), "reviews.csv");

    let downloaded = store.download(&key).await.expect("Download should succeed");
    assert_eq!(downloaded, data);

    store.delete(&key).await.expect("Delete should succeed");
    assert!(store.list(&prefix).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_s3_list_is_recursive_and_sorted() {
    let Some(store) = setup_store().await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let prefix = test_prefix("listing");
    for name in ["c.csv", "a.csv", "b/d.csv"] {
        store
            .upload(&format!("{}{}", prefix, name), b"x".to_vec(), None)
            .await
            .unwrap();
    }

    let keys: Vec<_> = store
        .list(&prefix)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.key.trim_start_matches(prefix.as_str()).to_string())
        .collect();
    assert_eq!(keys, vec!["a.csv", "b/d.csv", "c.csv"]);

    cleanup(&store, &prefix).await;
}

#[tokio::test]
async fn test_pipeline_against_s3() {
    let Some(store) = setup_store().await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let prefix = test_prefix("pipeline");
    let uri = |segment: &str| {
        Location::parse(&format!("s3://{}/{}{}", store.bucket(), prefix, segment)).unwrap()
    };

    store
        .upload(
            &format!("{}landing/reviews.csv", prefix),
            b"product_id,customer_id,rating,review_date,review_text\nabc1,c9,,2024-01-15,\n".to_vec(),
            None,
        )
        .await
        .unwrap();

    let mut config = JobConfig::default().apply(JobOverrides {
        input: Some(uri("landing")),
        processed: Some(uri("processed-data")),
        analytics: Some(uri("Athena Results")),
        ..Default::default()
    });
    config.storage = StorageConfig::from_env();

    let session = EtlSession::connect(&config).await;
    let stats = ReviewPipeline::new(config, session)
        .run()
        .await
        .expect("Pipeline should succeed");
    assert_eq!(stats.stage.rows_written, 1);

    let processed = store.list(&format!("{}processed-data/", prefix)).await.unwrap();
    assert_eq!(processed.len(), 1);
    let body = store.download(&processed[0].key).await.unwrap();
    assert!(String::from_utf8(body)
        .unwrap()
        .ends_with("abc1,c9,0,2024-01-15,No review text,ABC1\n"));

    let top = store
        .list(&format!("{}Athena Results/top-customers/", prefix))
        .await
        .unwrap();
    assert_eq!(top.len(), 1);

    cleanup(&store, &prefix).await;
}
