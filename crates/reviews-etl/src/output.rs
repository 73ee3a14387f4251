//! CSV output helpers shared by the stage, quarantine and analytics writers

use csv::{Writer, WriterBuilder};
use reviews_common::Result;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::session::LocationHandle;

pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// A row type with a fixed CSV header.
///
/// The header is written explicitly so that an empty result still produces a
/// header line.
pub trait CsvRow: Serialize {
    const HEADER: &'static [&'static str];
}

/// In-memory writer with `\n` line endings; headers are written by the caller
pub fn csv_writer() -> Writer<Vec<u8>> {
    WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

/// Encode `rows` as CSV with a header line
pub fn encode_csv<T: CsvRow>(rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv_writer();

    writer.write_record(T::HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }

    Ok(writer.into_inner()?)
}

/// `part-00000-<run id>.csv`
pub fn part_file_name(index: usize, run_id: &Uuid) -> String {
    format!("part-{:05}-{}.csv", index, run_id)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub files_written: usize,
    pub files_removed: usize,
    pub bytes_written: u64,
}

/// Replace everything under `handle` with the given encoded part files
#[instrument(skip(handle, parts), fields(location = %handle.location(), parts = parts.len()))]
pub async fn overwrite(handle: &LocationHandle, parts: Vec<Vec<u8>>, run_id: &Uuid) -> Result<WriteStats> {
    let mut stats = WriteStats {
        files_removed: handle.clear().await?,
        ..Default::default()
    };

    for (index, data) in parts.into_iter().enumerate() {
        let name = part_file_name(index, run_id);
        let result = handle
            .write(&name, data, Some(CSV_CONTENT_TYPE.to_string()))
            .await?;
        debug!(key = %result.key, size = result.size, checksum = %result.checksum, "Wrote part file");

        stats.files_written += 1;
        stats.bytes_written += result.size as u64;
    }

    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: Option<String>,
        score: f64,
    }

    impl CsvRow for Row {
        const HEADER: &'static [&'static str] = &["name", "score"];
    }

    #[test]
    fn test_encode_csv_writes_header_and_nulls() {
        let rows = vec![
            Row {
                name: Some("a, b".to_string()),
                score: 5.0,
            },
            Row {
                name: None,
                score: 10.0 / 3.0,
            },
        ];
        let text = String::from_utf8(encode_csv(&rows).unwrap()).unwrap();
        assert_eq!(text, "name,score\n\"a, b\",5.0\n,3.3333333333333335\n");
    }

    #[test]
    fn test_encode_csv_empty_is_header_only() {
        let text = String::from_utf8(encode_csv::<Row>(&[]).unwrap()).unwrap();
        assert_eq!(text, "name,score\n");
    }

    #[test]
    fn test_part_file_name() {
        let run_id = Uuid::nil();
        assert_eq!(
            part_file_name(3, &run_id),
            "part-00003-00000000-0000-0000-0000-000000000000.csv"
        );
    }
}
