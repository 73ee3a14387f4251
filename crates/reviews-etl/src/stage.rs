//! Stage write: persist the cleaned dataset to the processed location

use reviews_common::{EtlError, Result};
use std::borrow::Cow;
use tracing::{info, instrument};

use crate::location::Location;
use crate::output::{self, encode_csv, CsvRow};
use crate::session::EtlSession;
use crate::transform::CleanedReview;

pub const DEFAULT_MAX_ROWS_PER_FILE: usize = 100_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageStats {
    pub rows_written: usize,
    pub files_written: usize,
    pub files_removed: usize,
    pub bytes_written: u64,
}

/// Overwrite `location` with `rows`, split into part files of at most
/// `max_rows_per_file` rows. An empty dataset still yields one header-only
/// part.
#[instrument(skip(session, rows, columns), fields(rows = rows.len(), location = %location))]
pub async fn write_cleaned(
    session: &EtlSession,
    rows: &[CleanedReview],
    columns: &[String],
    location: &Location,
    max_rows_per_file: usize,
) -> Result<StageStats> {
    let parts = encode_cleaned_parts(rows, columns, max_rows_per_file)?;

    let handle = session.open(location)?;
    let written = output::overwrite(&handle, parts, &session.run_id()).await?;

    info!(
        rows = rows.len(),
        columns = columns.len(),
        files = written.files_written,
        bytes = written.bytes_written,
        "Wrote cleaned dataset to {}",
        location
    );

    Ok(StageStats {
        rows_written: rows.len(),
        files_written: written.files_written,
        files_removed: written.files_removed,
        bytes_written: written.bytes_written,
    })
}

/// Encode cleaned rows under the given header, `max_rows` rows per part
pub fn encode_cleaned_parts(
    rows: &[CleanedReview],
    columns: &[String],
    max_rows: usize,
) -> Result<Vec<Vec<u8>>> {
    check_part_size(max_rows)?;

    if rows.is_empty() {
        return Ok(vec![encode_cleaned(&[], columns)?]);
    }

    rows.chunks(max_rows)
        .map(|chunk| encode_cleaned(chunk, columns))
        .collect()
}

fn encode_cleaned(rows: &[CleanedReview], columns: &[String]) -> Result<Vec<u8>> {
    let mut writer = output::csv_writer();
    writer.write_record(columns)?;

    for row in rows {
        let values: Vec<Cow<'_, str>> = columns
            .iter()
            .map(|column| row.field(column).unwrap_or_default())
            .collect();
        writer.write_record(values.iter().map(|value| value.as_bytes()))?;
    }

    Ok(writer.into_inner()?)
}

/// Encode `rows` in chunks of `max_rows` rows, each with its own header
pub fn encode_parts<T: CsvRow>(rows: &[T], max_rows: usize) -> Result<Vec<Vec<u8>>> {
    check_part_size(max_rows)?;

    if rows.is_empty() {
        return Ok(vec![encode_csv::<T>(&[])?]);
    }

    rows.chunks(max_rows).map(encode_csv::<T>).collect()
}

fn check_part_size(max_rows: usize) -> Result<()> {
    if max_rows == 0 {
        return Err(EtlError::Config("max rows per file must be positive".to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ingest::QuarantinedRow;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn review_columns() -> Vec<String> {
        ["product_id", "customer_id", "rating", "review_date", "review_text", "product_id_upper"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn review(product_id: &str, rating: i32) -> CleanedReview {
        CleanedReview {
            product_id: Some(product_id.to_string()),
            customer_id: Some("c1".to_string()),
            rating,
            review_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            review_text: "fine".to_string(),
            product_id_upper: Some(product_id.to_uppercase()),
            extra: Vec::new(),
        }
    }

    #[test]
    fn test_encode_parts_splits_rows() {
        let rows: Vec<_> = (0..5).map(|i| review(&format!("p{}", i), i)).collect();
        let parts = encode_cleaned_parts(&rows, &review_columns(), 2).unwrap();
        assert_eq!(parts.len(), 3);

        let last = String::from_utf8(parts[2].clone()).unwrap();
        assert_eq!(
            last,
            "product_id,customer_id,rating,review_date,review_text,product_id_upper\n\
             p4,c1,4,2024-01-15,fine,P4\n"
        );
    }

    #[test]
    fn test_encode_parts_empty_is_one_header_file() {
        let parts = encode_cleaned_parts(&[], &review_columns(), 10).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(
            String::from_utf8(parts[0].clone()).unwrap(),
            "product_id,customer_id,rating,review_date,review_text,product_id_upper\n"
        );

        let quarantine = encode_parts::<QuarantinedRow>(&[], 10).unwrap();
        assert_eq!(quarantine, vec![b"source,line,reason,raw_record\n".to_vec()]);
    }

    #[test]
    fn test_encode_parts_rejects_zero_chunk() {
        assert!(encode_cleaned_parts(&[review("p", 1)], &review_columns(), 0).is_err());
        assert!(encode_parts::<QuarantinedRow>(&[], 0).is_err());
    }

    #[test]
    fn test_null_date_and_product_written_empty() {
        let row = CleanedReview {
            product_id: None,
            customer_id: Some("c1".to_string()),
            rating: 0,
            review_date: None,
            review_text: "No review text".to_string(),
            product_id_upper: None,
            extra: Vec::new(),
        };
        let parts = encode_cleaned_parts(&[row], &review_columns(), 10).unwrap();
        let text = String::from_utf8(parts[0].clone()).unwrap();
        assert!(text.ends_with("\n,c1,0,,No review text,\n"));
    }

    #[test]
    fn test_extra_columns_written_in_header_order() {
        let mut row = review("abc1", 5);
        row.extra = vec![(Arc::from("review_id"), Some("r1".to_string()))];
        let columns: Vec<String> = [
            "review_id",
            "product_id",
            "customer_id",
            "rating",
            "review_date",
            "review_text",
            "helpful_votes",
            "product_id_upper",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();

        let parts = encode_cleaned_parts(&[row], &columns, 10).unwrap();
        assert_eq!(
            String::from_utf8(parts[0].clone()).unwrap(),
            "review_id,product_id,customer_id,rating,review_date,review_text,helpful_votes,product_id_upper\n\
             r1,abc1,c1,5,2024-01-15,fine,,ABC1\n"
        );
    }

    #[tokio::test]
    async fn test_write_cleaned_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let location = Location::Local {
            path: dir.path().join("processed"),
        };
        let session = EtlSession::new(None);
        let handle = session.open(&location).unwrap();
        handle.write("stale.csv", b"old".to_vec(), None).await.unwrap();

        let rows: Vec<_> = (0..3).map(|i| review("p", i)).collect();
        let stats = write_cleaned(&session, &rows, &review_columns(), &location, 2)
            .await
            .unwrap();

        assert_eq!(stats.rows_written, 3);
        assert_eq!(stats.files_written, 2);
        assert_eq!(stats.files_removed, 1);

        let keys: Vec<_> = handle
            .list_files()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(
            keys,
            vec![
                output::part_file_name(0, &session.run_id()),
                output::part_file_name(1, &session.run_id()),
            ]
        );
    }
}
