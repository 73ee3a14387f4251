//! Reviews ETL
//!
//! Batch job that reads product review CSVs from a landing location, cleans
//! them, writes the cleaned dataset to a processed location and publishes
//! four aggregate reports.
//!
//! ```no_run
//! use reviews_etl::{config::JobConfig, pipeline::ReviewPipeline, session::EtlSession};
//!
//! # async fn run() -> reviews_common::Result<()> {
//! let config = JobConfig::from_env()?;
//! let session = EtlSession::connect(&config).await;
//! let stats = ReviewPipeline::new(config, session).run().await?;
//! tracing::info!("cleaned {} records", stats.stage.rows_written);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod analytics;
pub mod config;
pub mod ingest;
pub mod location;
pub mod output;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod stage;
pub mod storage;
pub mod transform;

pub use config::{JobConfig, JobOverrides};
pub use location::Location;
pub use pipeline::{PipelineStats, ReviewPipeline};
pub use session::EtlSession;
