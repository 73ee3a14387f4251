//! reviews-etl - clean product reviews and publish review analytics

use anyhow::{Context, Result};
use clap::Parser;
use reviews_common::logging::{init_logging, LogConfig, LogLevel};
use reviews_etl::analytics::AnalyticsMode;
use reviews_etl::{EtlSession, JobConfig, JobOverrides, Location, ReviewPipeline};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "reviews-etl")]
#[command(author, version, about = "Clean product review CSVs and publish review analytics")]
struct Cli {
    /// Landing location to read (s3://bucket/prefix or a local directory)
    #[arg(long, env = "REVIEWS_INPUT_URI")]
    input: Option<Location>,

    /// Location for the cleaned dataset (overwritten)
    #[arg(long, env = "REVIEWS_PROCESSED_URI")]
    processed: Option<Location>,

    /// Parent location for the query results
    #[arg(long, env = "REVIEWS_ANALYTICS_URI")]
    analytics: Option<Location>,

    /// Location for rows that do not match their file's header
    #[arg(long, env = "REVIEWS_QUARANTINE_URI")]
    quarantine: Option<Location>,

    /// Maximum rows per cleaned part file
    #[arg(long, env = "REVIEWS_MAX_ROWS_PER_FILE")]
    max_rows_per_file: Option<usize>,

    /// How the analytics queries are scheduled
    #[arg(long, value_enum, env = "REVIEWS_ANALYTICS_MODE")]
    analytics_mode: Option<AnalyticsMode>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("reviews-etl")
        .filter_directives("aws_smithy_runtime=warn,aws_config=warn,hyper=warn")
        .build()
        .with_env_overrides()?;

    let _guard = init_logging(&log_config)?;

    let config = JobConfig::from_env()
        .context("Failed to load job configuration")?
        .apply(JobOverrides {
            input: cli.input,
            processed: cli.processed,
            analytics: cli.analytics,
            quarantine: cli.quarantine,
            max_rows_per_file: cli.max_rows_per_file,
            analytics_mode: cli.analytics_mode,
        });
    config.validate().context("Invalid job configuration")?;

    let session = EtlSession::connect(&config).await;
    let mut pipeline = ReviewPipeline::new(config, session);
    let stats = pipeline.run().await.context("Reviews ETL failed")?;

    info!(
        files = stats.ingest.files_read,
        records = stats.ingest.records_read,
        quarantined = stats.ingest.records_quarantined,
        ratings_defaulted = stats.transform.ratings_defaulted,
        dates_unparsed = stats.transform.dates_unparsed,
        part_files = stats.stage.files_written,
        queries = stats.queries.len(),
        "Job complete"
    );
    Ok(())
}
