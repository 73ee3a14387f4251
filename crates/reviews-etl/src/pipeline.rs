//! End-to-end job: ingest → transform → stage write → analytics

use reviews_common::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::analytics::{self, QueryReport};
use crate::config::JobConfig;
use crate::ingest::{self, IngestStats};
use crate::output;
use crate::session::{EtlSession, REVIEWS_VIEW};
use crate::stage::{self, StageStats};
use crate::transform::{self, TransformStats};

#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub ingest: IngestStats,
    pub transform: TransformStats,
    pub stage: StageStats,
    pub quarantine_files: usize,
    pub queries: Vec<QueryReport>,
    pub duration_seconds: f64,
}

pub struct ReviewPipeline {
    config: JobConfig,
    session: EtlSession,
}

impl ReviewPipeline {
    pub fn new(config: JobConfig, session: EtlSession) -> Self {
        Self { config, session }
    }

    pub fn session(&self) -> &EtlSession {
        &self.session
    }

    /// Run the whole job once. Any error is fatal for the run.
    #[instrument(skip(self), fields(run_id = %self.session.run_id()))]
    pub async fn run(&mut self) -> Result<PipelineStats> {
        let start = Instant::now();
        self.config.validate()?;

        info!(
            input = %self.config.input,
            processed = %self.config.processed,
            analytics = %self.config.analytics,
            "Starting reviews ETL"
        );

        info!("Step 1/4: Reading reviews from {}...", self.config.input);
        let ingested = ingest::ingest(&self.session, &self.config.input).await?;
        info!(
            "Read {} records from {} files ({} skipped, {} quarantined)",
            ingested.stats.records_read,
            ingested.stats.files_read,
            ingested.stats.files_skipped,
            ingested.stats.records_quarantined
        );

        let mut quarantine_files = 0;
        match &self.config.quarantine {
            Some(location) => {
                let parts = stage::encode_parts(&ingested.quarantined, self.config.max_rows_per_file)?;
                let handle = self.session.open(location)?;
                quarantine_files = output::overwrite(&handle, parts, &self.session.run_id())
                    .await?
                    .files_written;
                info!("Wrote {} quarantined rows to {}", ingested.quarantined.len(), location);
            },
            None if !ingested.quarantined.is_empty() => {
                warn!(
                    "{} malformed rows were dropped; set {} to keep them",
                    ingested.quarantined.len(),
                    crate::config::ENV_QUARANTINE_URI
                );
            },
            None => {},
        }

        let columns = ingested.columns.output();

        info!("Step 2/4: Transforming {} records...", ingested.records.len());
        let (cleaned, transform_stats) = transform::transform(ingested.records);

        info!("Step 3/4: Writing cleaned dataset to {}...", self.config.processed);
        let stage_stats = stage::write_cleaned(
            &self.session,
            &cleaned,
            &columns,
            &self.config.processed,
            self.config.max_rows_per_file,
        )
        .await?;

        info!(
            "Step 4/4: Running {} analytics queries ({})...",
            analytics::AnalyticsQuery::ALL.len(),
            self.config.analytics_mode
        );
        self.session.register_view(REVIEWS_VIEW, Arc::new(cleaned));
        let queries =
            analytics::run_analytics(&self.session, &self.config.analytics, self.config.analytics_mode)
                .await?;

        let duration = start.elapsed();
        info!(
            "Reviews ETL complete: {} records cleaned, {} part files, {} queries in {:.2}s",
            stage_stats.rows_written,
            stage_stats.files_written,
            queries.len(),
            duration.as_secs_f64()
        );

        Ok(PipelineStats {
            ingest: ingested.stats,
            transform: transform_stats,
            stage: stage_stats,
            quarantine_files,
            queries,
            duration_seconds: duration.as_secs_f64(),
        })
    }
}
