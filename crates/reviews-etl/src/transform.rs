//! Transform stage: the only business logic in the job.
//!
//! Every rule is row-local and total. Bad values degrade to documented
//! defaults; nothing here can fail.
//!
//! | Column             | Rule                                                      |
//! |--------------------|-----------------------------------------------------------|
//! | `rating`           | integer, truncating decimals; null/unparseable → `0`      |
//! | `review_date`      | strict `yyyy-MM-dd`; anything else → null                 |
//! | `review_text`      | null → `"No review text"`                                 |
//! | `product_id_upper` | uppercase of `product_id`; null stays null (new column)   |
//!
//! Columns outside the review schema pass through unchanged.

use chrono::NaiveDate;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::info;

use crate::schema::{RawReview, CUSTOMER_ID, PRODUCT_ID, PRODUCT_ID_UPPER, RATING, REVIEW_DATE, REVIEW_TEXT};

pub const DEFAULT_RATING: i32 = 0;
pub const DEFAULT_REVIEW_TEXT: &str = "No review text";

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedReview {
    pub product_id: Option<String>,
    pub customer_id: Option<String>,
    pub rating: i32,
    pub review_date: Option<NaiveDate>,
    pub review_text: String,
    pub product_id_upper: Option<String>,
    pub extra: Vec<(Arc<str>, Option<String>)>,
}

impl CleanedReview {
    /// Text value of `column` as written to the cleaned dataset; `None` is null
    pub fn field(&self, column: &str) -> Option<Cow<'_, str>> {
        match column {
            PRODUCT_ID => self.product_id.as_deref().map(Cow::Borrowed),
            CUSTOMER_ID => self.customer_id.as_deref().map(Cow::Borrowed),
            RATING => Some(Cow::Owned(self.rating.to_string())),
            REVIEW_DATE => self
                .review_date
                .map(|date| Cow::Owned(date.format("%Y-%m-%d").to_string())),
            REVIEW_TEXT => Some(Cow::Borrowed(self.review_text.as_str())),
            PRODUCT_ID_UPPER => self.product_id_upper.as_deref().map(Cow::Borrowed),
            other => self
                .extra
                .iter()
                .find(|(name, _)| &**name == other)
                .and_then(|(_, value)| value.as_deref())
                .map(Cow::Borrowed),
        }
    }
}

/// Counters for values that fell back to a default
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub records: usize,
    /// Null or unparseable ratings now counted as `0`
    pub ratings_defaulted: usize,
    pub dates_missing: usize,
    pub dates_unparsed: usize,
    pub review_text_defaulted: usize,
    pub product_ids_missing: usize,
}

/// Parse a rating the way an integer cast of text behaves: surrounding
/// whitespace is ignored and a decimal part is truncated toward zero.
/// `None` means the caller should fall back to [`DEFAULT_RATING`].
pub fn parse_rating(raw: &str) -> Option<i32> {
    let text = raw.trim();
    if let Ok(value) = text.parse::<i32>() {
        return Some(value);
    }

    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let (whole, fraction) = unsigned.split_once('.')?;
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let magnitude: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).ok()
}

/// Strict `yyyy-MM-dd`: zero-padded month and day, real calendar date
pub fn parse_review_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    let bytes = text.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }

    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !digits_ok {
        return None;
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Clean one record, updating `stats`
pub fn clean_review(raw: RawReview, stats: &mut TransformStats) -> CleanedReview {
    stats.records += 1;

    let rating = match raw.rating.as_deref().and_then(parse_rating) {
        Some(value) => value,
        None => {
            stats.ratings_defaulted += 1;
            DEFAULT_RATING
        },
    };

    let review_date = match raw.review_date.as_deref() {
        None => {
            stats.dates_missing += 1;
            None
        },
        Some(text) => {
            let parsed = parse_review_date(text);
            if parsed.is_none() {
                stats.dates_unparsed += 1;
            }
            parsed
        },
    };

    let review_text = raw.review_text.unwrap_or_else(|| {
        stats.review_text_defaulted += 1;
        DEFAULT_REVIEW_TEXT.to_string()
    });

    if raw.product_id.is_none() {
        stats.product_ids_missing += 1;
    }
    let product_id_upper = raw.product_id.as_deref().map(str::to_uppercase);

    CleanedReview {
        product_id: raw.product_id,
        customer_id: raw.customer_id,
        rating,
        review_date,
        review_text,
        product_id_upper,
        extra: raw.extra,
    }
}

/// Clean the whole record set
pub fn transform(records: Vec<RawReview>) -> (Vec<CleanedReview>, TransformStats) {
    let mut stats = TransformStats::default();
    let cleaned: Vec<_> = records
        .into_iter()
        .map(|raw| clean_review(raw, &mut stats))
        .collect();

    info!(
        records = stats.records,
        ratings_defaulted = stats.ratings_defaulted,
        dates_missing = stats.dates_missing,
        dates_unparsed = stats.dates_unparsed,
        review_text_defaulted = stats.review_text_defaulted,
        product_ids_missing = stats.product_ids_missing,
        "Transformed reviews"
    );

    (cleaned, stats)
}
