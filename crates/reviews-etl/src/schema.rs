//! Declared review schema
//!
//! Input files must carry the five review columns by name. Any other columns
//! are carried through to the cleaned dataset untouched. Value types are
//! declared here but enforced by the transform stage, which coerces instead
//! of rejecting.
//!
//! Files may disagree on their extra columns. The cleaned dataset uses the
//! union of every file's header in first-seen order, and rows from files
//! without a column hold null in it.

use csv::ByteRecord;
use reviews_common::{EtlError, Result};
use std::fmt;
use std::sync::Arc;

pub const PRODUCT_ID: &str = "product_id";
pub const CUSTOMER_ID: &str = "customer_id";
pub const RATING: &str = "rating";
pub const REVIEW_DATE: &str = "review_date";
pub const REVIEW_TEXT: &str = "review_text";
/// Derived column appended by the transform stage
pub const PRODUCT_ID_UPPER: &str = "product_id_upper";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Date,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Date => "date",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

/// The review columns in output order
pub const REVIEW_COLUMNS: [ColumnSpec; 5] = [
    ColumnSpec {
        name: PRODUCT_ID,
        kind: ColumnKind::Text,
    },
    ColumnSpec {
        name: CUSTOMER_ID,
        kind: ColumnKind::Text,
    },
    ColumnSpec {
        name: RATING,
        kind: ColumnKind::Integer,
    },
    ColumnSpec {
        name: REVIEW_DATE,
        kind: ColumnKind::Date,
    },
    ColumnSpec {
        name: REVIEW_TEXT,
        kind: ColumnKind::Text,
    },
];

/// One input row, before cleaning. Empty fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReview {
    pub product_id: Option<String>,
    pub customer_id: Option<String>,
    pub rating: Option<String>,
    pub review_date: Option<String>,
    pub review_text: Option<String>,
    /// Columns outside the review schema, in header order
    pub extra: Vec<(Arc<str>, Option<String>)>,
}

/// Positions of the review columns within one file's header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    indices: [usize; 5],
    width: usize,
    columns: Vec<Arc<str>>,
    extras: Vec<(usize, Arc<str>)>,
    duplicates: Vec<String>,
}

impl ColumnMapping {
    /// Match a header row against the declared columns
    pub fn resolve(source: &str, header: &ByteRecord) -> Result<Self> {
        let names: Vec<String> = header
            .iter()
            .map(|field| {
                String::from_utf8_lossy(field)
                    .trim_start_matches('\u{feff}')
                    .trim()
                    .to_string()
            })
            .collect();

        let mut indices = [0usize; 5];
        let mut missing = Vec::new();
        for (slot, spec) in indices.iter_mut().zip(REVIEW_COLUMNS.iter()) {
            match names.iter().position(|n| n == spec.name) {
                Some(idx) => *slot = idx,
                None => missing.push(format!("{} ({})", spec.name, spec.kind)),
            }
        }

        if !missing.is_empty() {
            return Err(EtlError::Schema(format!(
                "{} is missing required columns: {}",
                source,
                missing.join(", ")
            )));
        }

        let mut columns: Vec<Arc<str>> = Vec::with_capacity(names.len());
        let mut extras = Vec::new();
        let mut duplicates = Vec::new();

        for (idx, name) in names.iter().enumerate() {
            // Unnamed columns get positional names so they survive the write
            let name = if name.is_empty() {
                format!("_c{}", idx)
            } else {
                name.clone()
            };

            if columns.iter().any(|c| **c == *name) {
                duplicates.push(name);
                continue;
            }

            let name: Arc<str> = Arc::from(name);
            let declared = REVIEW_COLUMNS.iter().any(|spec| spec.name == &*name);
            if !declared && &*name != PRODUCT_ID_UPPER {
                extras.push((idx, Arc::clone(&name)));
            }
            columns.push(name);
        }

        Ok(Self {
            indices,
            width: names.len(),
            columns,
            extras,
            duplicates,
        })
    }

    /// Number of fields every data row must have
    pub fn width(&self) -> usize {
        self.width
    }

    /// Distinct header columns in header order
    pub fn columns(&self) -> &[Arc<str>] {
        &self.columns
    }

    /// Header columns outside the review schema
    pub fn extra_columns(&self) -> Vec<&str> {
        self.extras.iter().map(|(_, name)| &**name).collect()
    }

    /// Repeated header names; only the first occurrence is read
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Pull the review fields out of a conforming row
    pub fn extract(&self, record: &ByteRecord) -> RawReview {
        let field = |slot: usize| -> Option<String> {
            record
                .get(self.indices[slot])
                .filter(|value| !value.is_empty())
                .map(|value| String::from_utf8_lossy(value).into_owned())
        };

        RawReview {
            product_id: field(0),
            customer_id: field(1),
            rating: field(2),
            review_date: field(3),
            review_text: field(4),
            extra: self
                .extras
                .iter()
                .map(|(idx, name)| {
                    let value = record
                        .get(*idx)
                        .filter(|value| !value.is_empty())
                        .map(|value| String::from_utf8_lossy(value).into_owned());
                    (Arc::clone(name), value)
                })
                .collect(),
        }
    }
}

/// Column layout of the cleaned dataset, merged across input files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetColumns {
    names: Vec<Arc<str>>,
}

impl DatasetColumns {
    /// Append the columns of `mapping` not seen in an earlier file
    pub fn merge(&mut self, mapping: &ColumnMapping) {
        for name in mapping.columns() {
            if !self.names.contains(name) {
                self.names.push(Arc::clone(name));
            }
        }
    }

    /// Output header: the input columns followed by `product_id_upper`.
    ///
    /// With no input header at all the review columns are used. An input
    /// column already named `product_id_upper` keeps its position and is
    /// overwritten with the derived value.
    pub fn output(&self) -> Vec<String> {
        let mut columns: Vec<String> = if self.names.is_empty() {
            REVIEW_COLUMNS.iter().map(|spec| spec.name.to_string()).collect()
        } else {
            self.names.iter().map(|name| name.to_string()).collect()
        };

        if !columns.iter().any(|c| c == PRODUCT_ID_UPPER) {
            columns.push(PRODUCT_ID_UPPER.to_string());
        }
        columns
    }
}
