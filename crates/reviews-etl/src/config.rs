//! Job configuration
//!
//! Built in three layers: built-in defaults, then `REVIEWS_*` environment
//! variables (a `.env` file is loaded first if present), then command-line
//! overrides. S3 connection settings come from [`StorageConfig::from_env`].

use reviews_common::{EtlError, Result};
use std::env;
use tracing::debug;

use crate::analytics::AnalyticsMode;
use crate::location::Location;
use crate::stage::DEFAULT_MAX_ROWS_PER_FILE;
use crate::storage::StorageConfig;

pub const DEFAULT_INPUT_URI: &str = "s3://roopa-handsonfinallanding/";
pub const DEFAULT_PROCESSED_URI: &str = "s3://roopa-handsonfinalprocessed/processed-data/";
pub const DEFAULT_ANALYTICS_URI: &str = "s3://roopa-handsonfinalprocessed/Athena Results/";

pub const ENV_INPUT_URI: &str = "REVIEWS_INPUT_URI";
pub const ENV_PROCESSED_URI: &str = "REVIEWS_PROCESSED_URI";
pub const ENV_ANALYTICS_URI: &str = "REVIEWS_ANALYTICS_URI";
pub const ENV_QUARANTINE_URI: &str = "REVIEWS_QUARANTINE_URI";
pub const ENV_MAX_ROWS_PER_FILE: &str = "REVIEWS_MAX_ROWS_PER_FILE";
pub const ENV_ANALYTICS_MODE: &str = "REVIEWS_ANALYTICS_MODE";

#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Landing location, read recursively
    pub input: Location,
    /// Cleaned dataset location, overwritten each run
    pub processed: Location,
    /// Parent of the four query result locations
    pub analytics: Location,
    /// Where non-conforming rows are written; not written when unset
    pub quarantine: Option<Location>,
    pub max_rows_per_file: usize,
    pub analytics_mode: AnalyticsMode,
    pub storage: StorageConfig,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            input: default_location(DEFAULT_INPUT_URI),
            processed: default_location(DEFAULT_PROCESSED_URI),
            analytics: default_location(DEFAULT_ANALYTICS_URI),
            quarantine: None,
            max_rows_per_file: DEFAULT_MAX_ROWS_PER_FILE,
            analytics_mode: AnalyticsMode::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl JobConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }

        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        config.storage = StorageConfig::from_env();
        Ok(config)
    }

    /// Defaults overlaid with whatever `lookup` returns for the `REVIEWS_*` keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(uri) = get(ENV_INPUT_URI) {
            config.input = parse_setting(ENV_INPUT_URI, &uri)?;
        }
        if let Some(uri) = get(ENV_PROCESSED_URI) {
            config.processed = parse_setting(ENV_PROCESSED_URI, &uri)?;
        }
        if let Some(uri) = get(ENV_ANALYTICS_URI) {
            config.analytics = parse_setting(ENV_ANALYTICS_URI, &uri)?;
        }
        if let Some(uri) = get(ENV_QUARANTINE_URI) {
            config.quarantine = Some(parse_setting(ENV_QUARANTINE_URI, &uri)?);
        }
        if let Some(value) = get(ENV_MAX_ROWS_PER_FILE) {
            config.max_rows_per_file = value.trim().parse().map_err(|_| {
                EtlError::Config(format!("{} must be a positive integer, got '{}'", ENV_MAX_ROWS_PER_FILE, value))
            })?;
        }
        if let Some(value) = get(ENV_ANALYTICS_MODE) {
            config.analytics_mode = value.parse()?;
        }

        Ok(config)
    }

    pub fn apply(mut self, overrides: JobOverrides) -> Self {
        if let Some(input) = overrides.input {
            self.input = input;
        }
        if let Some(processed) = overrides.processed {
            self.processed = processed;
        }
        if let Some(analytics) = overrides.analytics {
            self.analytics = analytics;
        }
        if let Some(quarantine) = overrides.quarantine {
            self.quarantine = Some(quarantine);
        }
        if let Some(max_rows) = overrides.max_rows_per_file {
            self.max_rows_per_file = max_rows;
        }
        if let Some(mode) = overrides.analytics_mode {
            self.analytics_mode = mode;
        }
        self
    }

    /// Reject settings under which one stage would delete another's data.
    ///
    /// Every output is cleared before it is written, so no two of input,
    /// processed, analytics and quarantine may be equal or nested.
    pub fn validate(&self) -> Result<()> {
        if self.max_rows_per_file == 0 {
            return Err(EtlError::Config("max rows per file must be at least 1".to_string()));
        }

        let mut named = vec![
            ("input", &self.input),
            ("processed", &self.processed),
            ("analytics", &self.analytics),
        ];
        named.extend(self.quarantine.as_ref().map(|q| ("quarantine", q)));

        for (i, (name, location)) in named.iter().enumerate() {
            for (other_name, other) in &named[i + 1..] {
                if location.is_within(other) || other.is_within(location) {
                    return Err(EtlError::Config(format!(
                        "{} location {} overlaps {} location {}",
                        name, location, other_name, other
                    )));
                }
            }
        }

        Ok(())
    }

    /// Every location the run touches
    pub fn locations(&self) -> Vec<&Location> {
        let mut locations = vec![&self.input, &self.processed, &self.analytics];
        locations.extend(self.quarantine.as_ref());
        locations
    }
}

/// Command-line values that take precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct JobOverrides {
    pub input: Option<Location>,
    pub processed: Option<Location>,
    pub analytics: Option<Location>,
    pub quarantine: Option<Location>,
    pub max_rows_per_file: Option<usize>,
    pub analytics_mode: Option<AnalyticsMode>,
}

fn parse_setting(key: &str, value: &str) -> Result<Location> {
    Location::parse(value).map_err(|e| EtlError::Config(format!("{}: {}", key, e)))
}

fn default_location(uri: &str) -> Location {
    // Defaults are constant well-formed s3:// URIs
    Location::parse(uri).unwrap_or_else(|_| Location::Local { path: uri.into() })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = JobConfig::default();
        assert_eq!(config.input.to_string(), "s3://roopa-handsonfinallanding/");
        assert_eq!(
            config.processed.to_string(),
            "s3://roopa-handsonfinalprocessed/processed-data/"
        );
        assert_eq!(
            config.analytics.to_string(),
            "s3://roopa-handsonfinalprocessed/Athena Results/"
        );
        assert_eq!(config.quarantine, None);
        assert_eq!(config.max_rows_per_file, 100_000);
        assert_eq!(config.analytics_mode, AnalyticsMode::Concurrent);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = JobConfig::from_lookup(lookup(&[
            (ENV_INPUT_URI, "/data/landing"),
            (ENV_QUARANTINE_URI, "/data/quarantine"),
            (ENV_MAX_ROWS_PER_FILE, "500"),
            (ENV_ANALYTICS_MODE, "sequential"),
            (ENV_PROCESSED_URI, "  "),
        ]))
        .unwrap();

        assert_eq!(config.input, Location::parse("/data/landing").unwrap());
        assert_eq!(config.quarantine, Some(Location::parse("/data/quarantine").unwrap()));
        assert_eq!(config.max_rows_per_file, 500);
        assert_eq!(config.analytics_mode, AnalyticsMode::Sequential);
        // blank values fall back to the default
        assert_eq!(config.processed.to_string(), DEFAULT_PROCESSED_URI);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = JobConfig::from_lookup(lookup(&[(ENV_MAX_ROWS_PER_FILE, "lots")])).unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_ROWS_PER_FILE));

        let err = JobConfig::from_lookup(lookup(&[(ENV_INPUT_URI, "ftp://host/in")])).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_apply_overrides() {
        let config = JobConfig::default().apply(JobOverrides {
            analytics: Some(Location::parse("/tmp/analytics").unwrap()),
            max_rows_per_file: Some(10),
            ..Default::default()
        });
        assert_eq!(config.analytics, Location::parse("/tmp/analytics").unwrap());
        assert_eq!(config.max_rows_per_file, 10);
        assert_eq!(config.input.to_string(), DEFAULT_INPUT_URI);
    }

    fn local(path: &str) -> Option<Location> {
        Some(Location::parse(path).unwrap())
    }

    fn local_config(input: &str, processed: &str, analytics: &str, quarantine: Option<&str>) -> JobConfig {
        JobConfig::default().apply(JobOverrides {
            input: local(input),
            processed: local(processed),
            analytics: local(analytics),
            quarantine: quarantine.and_then(local),
            ..Default::default()
        })
    }

    #[test]
    fn test_validate_rejects_output_inside_input() {
        let config = JobConfig::default().apply(JobOverrides {
            input: Some(Location::parse("s3://roopa-handsonfinalprocessed/").unwrap()),
            ..Default::default()
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("input location"));
        assert!(err.to_string().contains("processed location"));

        let zero = JobConfig::default().apply(JobOverrides {
            max_rows_per_file: Some(0),
            ..Default::default()
        });
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_input_inside_output() {
        let config = JobConfig::default().apply(JobOverrides {
            input: Some(Location::parse("s3://b/landing/").unwrap()),
            processed: Some(Location::parse("s3://b/").unwrap()),
            analytics: Some(Location::parse("s3://other/analytics/").unwrap()),
            ..Default::default()
        });
        assert!(matches!(config.validate(), Err(EtlError::Config(_))));

        let nested = local_config("/data/out/landing", "/data/out", "/data/analytics", None);
        assert!(nested.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overlapping_outputs() {
        let same = local_config("/data/in", "/data/out", "/data/analytics", Some("/data/out"));
        let err = same.validate().unwrap_err().to_string();
        assert!(err.contains("processed location") && err.contains("quarantine location"));

        let nested = local_config("/data/in", "/data/out", "/data/analytics", Some("/data/out/bad"));
        assert!(nested.validate().is_err());

        let analytics_in_processed = local_config("/data/in", "/data/out", "/data/out/reports", None);
        assert!(analytics_in_processed.validate().is_err());

        let disjoint = local_config("/data/in", "/data/out", "/data/analytics", Some("/data/quarantine"));
        assert!(disjoint.validate().is_ok());
    }

    #[test]
    fn test_locations_include_quarantine_when_set() {
        let mut config = JobConfig::default();
        assert_eq!(config.locations().len(), 3);
        config.quarantine = Some(Location::parse("/tmp/q").unwrap());
        assert_eq!(config.locations().len(), 4);
    }
}
