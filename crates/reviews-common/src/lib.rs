//! Reviews Common Library
//!
//! Shared error handling and logging for the reviews ETL workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`EtlError`] and the [`Result`] alias used by every stage
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`]
//!
//! # Example
//!
//! ```no_run
//! use reviews_common::{EtlError, Result};
//!
//! fn require_column(header: &[&str], name: &str) -> Result<usize> {
//!     header
//!         .iter()
//!         .position(|h| *h == name)
//!         .ok_or_else(|| EtlError::Schema(format!("missing column {}", name)))
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{EtlError, Result};
