//! Analytics stage
//!
//! Four fixed aggregation queries over the `product_reviews` view. Each one
//! writes a single CSV file into its own sub-location of the analytics
//! location, replacing whatever was there.
//!
//! In [`AnalyticsMode::Concurrent`] the queries run side by side against the
//! shared view and a failing query does not stop the others; the stage still
//! fails afterwards, naming every query that did not complete.
//! [`AnalyticsMode::Sequential`] runs them in order and stops at the first
//! failure.

use futures::stream::{self, StreamExt};
use reviews_common::{EtlError, Result};
use std::fmt;
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::location::Location;
use crate::output;
use crate::session::{EtlSession, REVIEWS_VIEW};

pub mod queries;

pub use queries::QueryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyticsQuery {
    ProductAvgRating,
    DailyReviewCount,
    TopCustomers,
    RatingDistribution,
}

impl AnalyticsQuery {
    pub const ALL: [AnalyticsQuery; 4] = [
        AnalyticsQuery::ProductAvgRating,
        AnalyticsQuery::DailyReviewCount,
        AnalyticsQuery::TopCustomers,
        AnalyticsQuery::RatingDistribution,
    ];

    /// Query name, also the result's sub-location under the analytics location
    pub fn name(self) -> &'static str {
        match self {
            AnalyticsQuery::ProductAvgRating => "product-avg-rating",
            AnalyticsQuery::DailyReviewCount => "daily-review-count",
            AnalyticsQuery::TopCustomers => "top-customers",
            AnalyticsQuery::RatingDistribution => "rating-distribution",
        }
    }

    /// Run the query against the registered view
    pub fn execute(self, session: &EtlSession) -> Result<QueryResult> {
        let view = session.view(REVIEWS_VIEW)?;
        let result = match self {
            AnalyticsQuery::ProductAvgRating => {
                QueryResult::ProductAvgRating(queries::product_avg_rating(&view))
            },
            AnalyticsQuery::DailyReviewCount => {
                QueryResult::DailyReviewCount(queries::daily_review_count(&view))
            },
            AnalyticsQuery::TopCustomers => QueryResult::TopCustomers(queries::top_customers(&view)),
            AnalyticsQuery::RatingDistribution => {
                QueryResult::RatingDistribution(queries::rating_distribution(&view))
            },
        };
        Ok(result)
    }
}

impl fmt::Display for AnalyticsQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AnalyticsMode {
    /// All queries at once; failures are collected
    #[default]
    Concurrent,
    /// One query at a time; the first failure aborts the rest
    Sequential,
}

impl fmt::Display for AnalyticsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyticsMode::Concurrent => f.write_str("concurrent"),
            AnalyticsMode::Sequential => f.write_str("sequential"),
        }
    }
}

impl std::str::FromStr for AnalyticsMode {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "concurrent" => Ok(AnalyticsMode::Concurrent),
            "sequential" => Ok(AnalyticsMode::Sequential),
            other => Err(EtlError::Config(format!(
                "invalid analytics mode '{}', expected concurrent or sequential",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReport {
    pub query: AnalyticsQuery,
    pub rows: usize,
    pub location: Location,
    pub file_key: String,
}

/// Run every query and write its result under `analytics`
#[instrument(skip(session), fields(analytics = %analytics, mode = %mode))]
pub async fn run_analytics(
    session: &EtlSession,
    analytics: &Location,
    mode: AnalyticsMode,
) -> Result<Vec<QueryReport>> {
    match mode {
        AnalyticsMode::Sequential => {
            let mut reports = Vec::with_capacity(AnalyticsQuery::ALL.len());
            for query in AnalyticsQuery::ALL {
                reports.push(run_query(session, query, analytics).await?);
            }
            Ok(reports)
        },
        AnalyticsMode::Concurrent => run_concurrent(session, analytics).await,
    }
}

async fn run_concurrent(session: &EtlSession, analytics: &Location) -> Result<Vec<QueryReport>> {
    let outcomes: Vec<(AnalyticsQuery, Result<QueryReport>)> = stream::iter(AnalyticsQuery::ALL)
        .map(|query| async move { (query, run_query(session, query, analytics).await) })
        .buffer_unordered(AnalyticsQuery::ALL.len())
        .collect()
        .await;

    let mut reports = Vec::new();
    let mut failed = Vec::new();

    for (query, outcome) in outcomes {
        match outcome {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!(query = %query, "Analytics query failed: {}", e);
                failed.push(query);
            },
        }
    }

    if !failed.is_empty() {
        failed.sort_by_key(|q| AnalyticsQuery::ALL.iter().position(|a| a == q));
        return Err(EtlError::Analytics {
            failed: failed.iter().map(|q| q.name().to_string()).collect(),
        });
    }

    // Report in query order regardless of completion order
    reports.sort_by_key(|r| AnalyticsQuery::ALL.iter().position(|q| *q == r.query));
    Ok(reports)
}

/// Execute one query and replace its output directory with the result
pub async fn run_query(
    session: &EtlSession,
    query: AnalyticsQuery,
    analytics: &Location,
) -> Result<QueryReport> {
    let start = Instant::now();

    let result = query.execute(session)?;
    let location = analytics.join(query.name());
    let handle = session.open(&location)?;

    let written = output::overwrite(&handle, vec![result.encode()?], &session.run_id()).await?;
    let file_key = output::part_file_name(0, &session.run_id());

    info!(
        query = %query,
        rows = result.len(),
        bytes = written.bytes_written,
        "Wrote {} results to {} in {:.2}s",
        query,
        location,
        start.elapsed().as_secs_f64()
    );

    Ok(QueryReport {
        query,
        rows: result.len(),
        location,
        file_key,
    })
}
