//! Storage locations
//!
//! A location is either an S3 prefix (`s3://bucket/some/prefix/`) or a local
//! directory (`/data/reviews`, `file:///data/reviews`). S3 prefixes are
//! normalized to end with `/` so that `processed` never matches
//! `processed-old/...` when listing.

use reviews_common::{EtlError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const S3_SCHEME: &str = "s3://";
const FILE_SCHEME: &str = "file://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    S3 { bucket: String, prefix: String },
    Local { path: PathBuf },
}

impl Location {
    /// Parse a location URI or local path
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EtlError::InvalidLocation("location is empty".to_string()));
        }

        if let Some(rest) = trimmed.strip_prefix(S3_SCHEME) {
            let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(EtlError::InvalidLocation(format!("missing bucket in '{}'", raw)));
            }
            return Ok(Location::S3 {
                bucket: bucket.to_string(),
                prefix: normalize_prefix(prefix),
            });
        }

        if let Some(path) = trimmed.strip_prefix(FILE_SCHEME) {
            if path.is_empty() {
                return Err(EtlError::InvalidLocation(format!("missing path in '{}'", raw)));
            }
            return Ok(Location::Local {
                path: PathBuf::from(path),
            });
        }

        if let Some((scheme, _)) = trimmed.split_once("://") {
            return Err(EtlError::InvalidLocation(format!(
                "unsupported scheme '{}' in '{}'",
                scheme, raw
            )));
        }

        Ok(Location::Local {
            path: PathBuf::from(trimmed),
        })
    }

    /// Sub-location `segment` beneath this one
    pub fn join(&self, segment: &str) -> Location {
        let segment = segment.trim_matches('/');
        match self {
            Location::S3 { bucket, prefix } => Location::S3 {
                bucket: bucket.clone(),
                prefix: normalize_prefix(&format!("{}{}", prefix, segment)),
            },
            Location::Local { path } => Location::Local {
                path: path.join(segment),
            },
        }
    }

    /// True when `self` is `other` or lies beneath it
    pub fn is_within(&self, other: &Location) -> bool {
        match (self, other) {
            (
                Location::S3 { bucket, prefix },
                Location::S3 {
                    bucket: other_bucket,
                    prefix: other_prefix,
                },
            ) => bucket == other_bucket && prefix.starts_with(other_prefix.as_str()),
            (Location::Local { path }, Location::Local { path: other_path }) => {
                normalize_path(path).starts_with(normalize_path(other_path))
            },
            _ => false,
        }
    }

    pub fn is_s3(&self) -> bool {
        matches!(self, Location::S3 { .. })
    }
}

impl FromStr for Location {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        Location::parse(s)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::S3 { bucket, prefix } => write!(f, "s3://{}/{}", bucket, prefix),
            Location::Local { path } => write!(f, "{}", path.display()),
        }
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

// Lexical only; locations may not exist yet
fn normalize_path(path: &Path) -> PathBuf {
    path.components().collect()
}
