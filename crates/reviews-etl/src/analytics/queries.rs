//! Aggregations over the cleaned review view
//!
//! Each query groups with a BTreeMap keyed by the grouping column. `Option`
//! orders `None` before `Some`, which gives "null first" for free.

use chrono::NaiveDate;
use reviews_common::Result;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::output::{encode_csv, CsvRow};
use crate::transform::CleanedReview;

pub const TOP_CUSTOMERS_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRatingRow {
    pub product_id_upper: Option<String>,
    pub average_rating: f64,
    pub review_count: i64,
}

impl CsvRow for ProductRatingRow {
    const HEADER: &'static [&'static str] = &["product_id_upper", "average_rating", "review_count"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCountRow {
    pub review_date: Option<NaiveDate>,
    pub daily_review_count: i64,
}

impl CsvRow for DailyCountRow {
    const HEADER: &'static [&'static str] = &["review_date", "daily_review_count"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerCountRow {
    pub customer_id: Option<String>,
    pub review_count: i64,
}

impl CsvRow for CustomerCountRow {
    const HEADER: &'static [&'static str] = &["customer_id", "review_count"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingCountRow {
    pub rating: i32,
    pub rating_count: i64,
}

impl CsvRow for RatingCountRow {
    const HEADER: &'static [&'static str] = &["rating", "rating_count"];
}

/// A finished result set, ready to be written once and dropped
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    ProductAvgRating(Vec<ProductRatingRow>),
    DailyReviewCount(Vec<DailyCountRow>),
    TopCustomers(Vec<CustomerCountRow>),
    RatingDistribution(Vec<RatingCountRow>),
}

impl QueryResult {
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            QueryResult::ProductAvgRating(rows) => encode_csv(rows),
            QueryResult::DailyReviewCount(rows) => encode_csv(rows),
            QueryResult::TopCustomers(rows) => encode_csv(rows),
            QueryResult::RatingDistribution(rows) => encode_csv(rows),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            QueryResult::ProductAvgRating(rows) => rows.len(),
            QueryResult::DailyReviewCount(rows) => rows.len(),
            QueryResult::TopCustomers(rows) => rows.len(),
            QueryResult::RatingDistribution(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mean rating and review count per `product_id_upper`, highest mean first.
/// Equal means fall back to `product_id_upper` ascending.
pub fn product_avg_rating(reviews: &[CleanedReview]) -> Vec<ProductRatingRow> {
    let mut groups: BTreeMap<Option<&str>, (i64, i64)> = BTreeMap::new();
    for review in reviews {
        let (sum, count) = groups.entry(review.product_id_upper.as_deref()).or_default();
        *sum += i64::from(review.rating);
        *count += 1;
    }

    let mut rows: Vec<_> = groups
        .into_iter()
        .map(|(product, (sum, count))| ProductRatingRow {
            product_id_upper: product.map(str::to_string),
            average_rating: sum as f64 / count as f64,
            review_count: count,
        })
        .collect();

    // Stable sort keeps the BTreeMap key order for ties
    rows.sort_by(|a, b| b.average_rating.total_cmp(&a.average_rating));
    rows
}

/// Review count per `review_date`, oldest first with null dates leading
pub fn daily_review_count(reviews: &[CleanedReview]) -> Vec<DailyCountRow> {
    let mut groups: BTreeMap<Option<NaiveDate>, i64> = BTreeMap::new();
    for review in reviews {
        *groups.entry(review.review_date).or_default() += 1;
    }

    groups
        .into_iter()
        .map(|(review_date, daily_review_count)| DailyCountRow {
            review_date,
            daily_review_count,
        })
        .collect()
}

/// The five customers with the most reviews. Equal counts are broken by
/// `customer_id` ascending so the cut at five is deterministic.
pub fn top_customers(reviews: &[CleanedReview]) -> Vec<CustomerCountRow> {
    let mut groups: BTreeMap<Option<&str>, i64> = BTreeMap::new();
    for review in reviews {
        *groups.entry(review.customer_id.as_deref()).or_default() += 1;
    }

    let mut ranked: Vec<_> = groups.into_iter().collect();
    ranked.sort_by_key(|(_, count)| Reverse(*count));

    ranked
        .into_iter()
        .take(TOP_CUSTOMERS_LIMIT)
        .map(|(customer, review_count)| CustomerCountRow {
            customer_id: customer.map(str::to_string),
            review_count,
        })
        .collect()
}

/// Review count per rating, lowest rating first. Rating `0` includes every
/// review whose source rating was missing or unparseable.
pub fn rating_distribution(reviews: &[CleanedReview]) -> Vec<RatingCountRow> {
    let mut groups: BTreeMap<i32, i64> = BTreeMap::new();
    for review in reviews {
        *groups.entry(review.rating).or_default() += 1;
    }

    groups
        .into_iter()
        .map(|(rating, rating_count)| RatingCountRow { rating, rating_count })
        .collect()
}
