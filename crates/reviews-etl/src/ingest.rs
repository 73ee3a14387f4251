//! Ingest stage
//!
//! Reads every data file under the input location as CSV with a header row.
//! Rows whose field count does not match their file's header are quarantined
//! rather than guessed at; everything else becomes a [`RawReview`].

use csv::{ByteRecord, ReaderBuilder};
use flate2::read::GzDecoder;
use reviews_common::{EtlError, Result};
use serde::Serialize;
use std::io::Read;
use tracing::{debug, info, instrument, warn};

use crate::location::Location;
use crate::output::{self, CsvRow};
use crate::schema::{ColumnMapping, DatasetColumns, RawReview};
use crate::session::EtlSession;
use crate::storage::ObjectEntry;

/// Quarantined rows per file logged individually before going quiet
const MAX_LOGGED_QUARANTINE: usize = 10;

/// A row that did not conform to its file's header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarantinedRow {
    pub source: String,
    pub line: u64,
    pub reason: String,
    pub raw_record: String,
}

impl CsvRow for QuarantinedRow {
    const HEADER: &'static [&'static str] = &["source", "line", "reason", "raw_record"];
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub files_read: usize,
    pub files_skipped: usize,
    pub records_read: usize,
    pub records_quarantined: usize,
}

#[derive(Debug, Default)]
pub struct IngestOutput {
    pub records: Vec<RawReview>,
    /// Union of the input headers
    pub columns: DatasetColumns,
    pub quarantined: Vec<QuarantinedRow>,
    pub stats: IngestStats,
}

/// Result of parsing a single file
#[derive(Debug, Default)]
pub struct ParsedFile {
    /// `None` when the file has no header row
    pub mapping: Option<ColumnMapping>,
    pub records: Vec<RawReview>,
    pub quarantined: Vec<QuarantinedRow>,
}

/// Read and parse every data file under `input`
#[instrument(skip(session), fields(input = %input))]
pub async fn ingest(session: &EtlSession, input: &Location) -> Result<IngestOutput> {
    let handle = session.open(input)?;
    let entries = handle.list_files().await?;

    let mut output = IngestOutput::default();

    for entry in &entries {
        if !is_data_file(entry) {
            debug!(key = %entry.key, size = entry.size, "Skipping non-data object");
            output.stats.files_skipped += 1;
            continue;
        }

        let source = handle.uri(&entry.key);
        let bytes = handle.read(&entry.key).await?;
        let bytes = decode(&source, &entry.key, bytes)?;

        let parsed = parse_file(&source, &bytes)?;
        info!(
            source = %source,
            records = parsed.records.len(),
            quarantined = parsed.quarantined.len(),
            "Parsed input file"
        );

        if let Some(mapping) = &parsed.mapping {
            output.columns.merge(mapping);
        }
        output.stats.files_read += 1;
        output.stats.records_read += parsed.records.len();
        output.stats.records_quarantined += parsed.quarantined.len();
        output.records.extend(parsed.records);
        output.quarantined.extend(parsed.quarantined);
    }

    if output.stats.files_read == 0 {
        warn!("No data files found under {}", input);
    }

    Ok(output)
}

/// Hidden and marker objects (`_SUCCESS`, `.part.crc`) and empty objects
/// are not data.
pub fn is_data_file(entry: &ObjectEntry) -> bool {
    let name = entry.file_name();
    entry.size > 0 && !name.is_empty() && !name.starts_with('_') && !name.starts_with('.')
}

fn decode(source: &str, key: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
    if !key.to_lowercase().ends_with(".gz") {
        return Ok(bytes);
    }

    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| EtlError::Decode {
            source_name: source.to_string(),
            message: format!("invalid gzip data: {}", e),
        })?;

    debug!("Decompressed {} -> {} bytes", bytes.len(), decompressed.len());
    Ok(decompressed)
}

/// Parse one CSV file. `source` is only used for diagnostics.
pub fn parse_file(source: &str, bytes: &[u8]) -> Result<ParsedFile> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let header = reader.byte_headers()?.clone();
    if header.is_empty() {
        debug!(source, "File has no header row");
        return Ok(ParsedFile::default());
    }

    let mapping = ColumnMapping::resolve(source, &header)?;
    if !mapping.extra_columns().is_empty() {
        debug!(source, extra = ?mapping.extra_columns(), "Carrying columns outside the review schema");
    }
    if !mapping.duplicates().is_empty() {
        warn!(source, duplicates = ?mapping.duplicates(), "Repeated header columns; reading the first of each");
    }

    let mut parsed = ParsedFile::default();
    let mut record = ByteRecord::new();

    while reader.read_byte_record(&mut record)? {
        // Blank lines are skipped by the reader; a lone empty field is the
        // same thing written by some exporters
        if record.len() == 1 && record.get(0).is_some_and(|f| f.is_empty()) {
            continue;
        }

        if record.len() != mapping.width() {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let reason = format!(
                "expected {} fields, found {}",
                mapping.width(),
                record.len()
            );

            let logged = parsed.quarantined.len();
            if logged < MAX_LOGGED_QUARANTINE {
                warn!(source, line, reason = %reason, "Quarantining malformed row");
            }

            parsed.quarantined.push(QuarantinedRow {
                source: source.to_string(),
                line,
                reason,
                raw_record: encode_record(&record)?,
            });
            continue;
        }

        parsed.records.push(mapping.extract(&record));
    }

    if parsed.quarantined.len() > MAX_LOGGED_QUARANTINE {
        warn!(
            source,
            suppressed = parsed.quarantined.len() - MAX_LOGGED_QUARANTINE,
            "Further malformed rows quarantined without individual log lines"
        );
    }

    parsed.mapping = Some(mapping);
    Ok(parsed)
}

fn encode_record(record: &ByteRecord) -> Result<String> {
    let mut writer = output::csv_writer();
    writer.write_byte_record(record)?;
    let bytes = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&bytes).trim_end_matches('\n').to_string())
}
