//! Error types for the reviews ETL job

use thiserror::Error;

/// Result type alias for ETL operations
pub type Result<T> = std::result::Result<T, EtlError>;

/// Main error type for the ETL job
///
/// Row-level data problems never surface here; they are coerced or
/// quarantined by the stages. Everything in this enum is fatal for the run.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Failed to decode {source_name}: {message}")]
    Decode { source_name: String, message: String },

    #[error("View not found: {0}")]
    ViewNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Analytics queries failed: {}", failed.join(", "))]
    Analytics { failed: Vec<String> },
}

impl From<anyhow::Error> for EtlError {
    fn from(err: anyhow::Error) -> Self {
        // Alternate formatting keeps the whole context chain
        EtlError::Storage(format!("{:#}", err))
    }
}

impl From<csv::IntoInnerError<csv::Writer<Vec<u8>>>> for EtlError {
    fn from(err: csv::IntoInnerError<csv::Writer<Vec<u8>>>) -> Self {
        EtlError::Io(err.into_error())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_keeps_context_chain() {
        let err = anyhow::anyhow!("connection reset").context("Failed to upload to S3");
        let etl: EtlError = err.into();
        assert_eq!(
            etl.to_string(),
            "Storage error: Failed to upload to S3: connection reset"
        );
    }

    #[test]
    fn test_analytics_error_lists_failed_queries() {
        let err = EtlError::Analytics {
            failed: vec!["top-customers".to_string(), "rating-distribution".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Analytics queries failed: top-customers, rating-distribution"
        );
    }
}
