//! Aggregate rating statistics.
//!
//! Every view that shows a score (marketplace, ranking, comparison, agent and
//! agency detail) parses its fetched rows with [`rating_records`] and reduces
//! them through [`aggregate_ratings`], so identical row sets always display
//! identical numbers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Scores are summed in thousandths of a point.
const SCALE: i128 = 1000;

/// Magnitude ceiling applied to each score before summing.
const SCORE_LIMIT: f64 = 1e15;

/// Anything that carries a single numeric score.
pub trait Rated {
    fn rating(&self) -> f64;
}

impl Rated for i64 {
    fn rating(&self) -> f64 {
        *self as f64
    }
}

impl Rated for f64 {
    fn rating(&self) -> f64 {
        *self
    }
}

/// One user's score for an agent or agency, as returned by the platform.
///
/// Only `rating` is interpreted; author, comment, timestamps and any other
/// columns ride along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub rating: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RatingRecord {
    pub fn new(rating: f64) -> Self {
        Self {
            rating,
            extra: Map::new(),
        }
    }
}

impl Rated for RatingRecord {
    fn rating(&self) -> f64 {
        self.rating
    }
}

/// Mean score and number of ratings for one entity. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateRating {
    /// Mean rounded half-up to one decimal; `None` when `count == 0`.
    pub average: Option<f64>,
    pub count: usize,
}

impl AggregateRating {
    pub fn is_rated(&self) -> bool {
        self.count > 0
    }
}

/// A score in thousandths, clamped to `±SCORE_LIMIT`. NaN counts as zero.
fn scaled(score: f64) -> i128 {
    let clamped = score.clamp(-SCORE_LIMIT, SCORE_LIMIT);
    (clamped * SCALE as f64).round() as i128
}

fn scaled_sum<R: Rated>(records: &[R]) -> i128 {
    records.iter().map(|r| scaled(r.rating())).sum()
}

/// Reduces rating records to their display statistic.
///
/// Scores are not range-checked: a stray `7` is averaged like any other
/// value. Each score is fixed to thousandths and summed in integers, so the
/// result does not depend on record order.
///
/// # Arguments
///
/// * `records` - The rating records fetched for one entity.
///
/// # Returns
///
/// * `AggregateRating` - `{ average: None, count: 0 }` for an empty slice.
pub fn aggregate_ratings<R: Rated>(records: &[R]) -> AggregateRating {
    if records.is_empty() {
        return AggregateRating::default();
    }

    let count = records.len();
    AggregateRating {
        average: Some(round_mean_to_tenth(scaled_sum(records), count as i128)),
        count,
    }
}

/// Unrounded mean of the records, for ordering; `None` when empty.
pub fn mean_rating<R: Rated>(records: &[R]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    Some(scaled_sum(records) as f64 / (records.len() as i128 * SCALE) as f64)
}

/// `sum / (count * SCALE)` rounded half-up at the first decimal.
///
/// `floor(10 * mean + 1/2)` computed exactly as
/// `floor((20 * sum + count * SCALE) / (2 * count * SCALE))`.
fn round_mean_to_tenth(sum: i128, count: i128) -> f64 {
    let tenths = (20 * sum + count * SCALE).div_euclid(2 * count * SCALE);
    tenths as f64 / 10.0
}

/// Parses fetched review rows into rating records.
///
/// Rows whose `rating` is missing or not a JSON number are skipped and do
/// not count; every numeric row counts, integral or not.
pub fn rating_records(rows: Vec<Value>) -> Vec<RatingRecord> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<RatingRecord>(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping malformed rating record: {}", e);
                None
            }
        })
        .collect()
}

/// Deserializes an embedded `reviews(rating)` collection.
///
/// A missing, `null` or non-array value yields no records; entries go
/// through [`rating_records`].
pub fn lenient_records<'de, D>(deserializer: D) -> Result<Vec<RatingRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(match value {
        Some(Value::Array(items)) => rating_records(items),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(scores: &[i64]) -> Vec<RatingRecord> {
        scores.iter().map(|s| RatingRecord::new(*s as f64)).collect()
    }

    #[test]
    fn test_empty_is_unrated() {
        let agg = aggregate_ratings::<RatingRecord>(&[]);
        assert_eq!(agg.average, None);
        assert_eq!(agg.count, 0);
        assert!(!agg.is_rated());
    }

    #[test]
    fn test_whole_mean() {
        let agg = aggregate_ratings(&records(&[5, 4, 3]));
        assert_eq!(agg.average, Some(4.0));
        assert_eq!(agg.count, 3);
    }

    #[test]
    fn test_exact_half() {
        let agg = aggregate_ratings(&records(&[5, 4]));
        assert_eq!(agg.average, Some(4.5));
        assert_eq!(agg.count, 2);
    }

    #[test]
    fn test_rounds_half_up_at_first_decimal() {
        // 4.25 -> 4.3, 4.666.. -> 4.7, 4.333.. -> 4.3
        assert_eq!(aggregate_ratings(&records(&[4, 4, 4, 5])).average, Some(4.3));
        assert_eq!(aggregate_ratings(&records(&[5, 5, 4])).average, Some(4.7));
        assert_eq!(aggregate_ratings(&records(&[5, 4, 4])).average, Some(4.3));
        // 1.05 -> 1.1
        let mut many = vec![1; 19];
        many.push(2);
        assert_eq!(aggregate_ratings(&records(&many)).average, Some(1.1));
    }

    #[test]
    fn test_out_of_range_scores_included() {
        let agg = aggregate_ratings(&records(&[7, 5]));
        assert_eq!(agg.average, Some(6.0));
        let agg = aggregate_ratings(&records(&[-1, -2]));
        assert_eq!(agg.average, Some(-1.5));
    }

    #[test]
    fn test_plain_integers_are_rated() {
        let agg = aggregate_ratings(&[3_i64, 4, 5]);
        assert_eq!(agg.average, Some(4.0));
    }

    #[test]
    fn test_extra_fields_preserved() {
        let record: RatingRecord = serde_json::from_value(json!({
            "rating": 4,
            "comment": "Muito bom",
            "user_id": "abc"
        }))
        .unwrap();
        assert_eq!(record.rating, 4.0);
        assert_eq!(record.extra.get("comment"), Some(&json!("Muito bom")));
    }

    #[test]
    fn test_fractional_scores_count() {
        // (5 + 4.5 + 4) / 3 = 4.5
        let agg = aggregate_ratings(&[5.0_f64, 4.5, 4.0]);
        assert_eq!(agg, AggregateRating { average: Some(4.5), count: 3 });
        // (4.5 + 4) / 2 = 4.25 -> 4.3
        assert_eq!(aggregate_ratings(&[4.5_f64, 4.0]).average, Some(4.3));
        assert_eq!(mean_rating(&[4.5_f64, 4.0]), Some(4.25));
        assert_eq!(mean_rating::<f64>(&[]), None);
    }

    #[test]
    fn test_rating_records_skip_non_numeric_rows() {
        let rows = vec![
            json!({"rating": 5}),
            json!({"rating": 4.5}),
            json!({"rating": "4"}),
            json!({"rating": null}),
            json!({"comment": "sem nota"}),
            json!(3),
        ];
        let recs = rating_records(rows);
        assert_eq!(recs.len(), 2);
        assert_eq!(aggregate_ratings(&recs), AggregateRating { average: Some(4.8), count: 2 });
    }

    #[test]
    fn test_extreme_scores_do_not_overflow() {
        let agg = aggregate_ratings(&[f64::MAX, f64::MAX, f64::NAN]);
        assert_eq!(agg.count, 3);
        assert!(agg.average.is_some_and(f64::is_finite));
    }

    #[derive(Deserialize)]
    struct Embedded {
        #[serde(default, deserialize_with = "lenient_records")]
        reviews: Vec<RatingRecord>,
    }

    #[test]
    fn test_lenient_records() {
        let e: Embedded = serde_json::from_value(json!({
            "reviews": [{"rating": 5}, {"rating": "x"}, {"comment": "sem nota"}, {"rating": 3}]
        }))
        .unwrap();
        assert_eq!(aggregate_ratings(&e.reviews).average, Some(4.0));

        let e: Embedded = serde_json::from_value(json!({ "reviews": null })).unwrap();
        assert!(e.reviews.is_empty());

        let e: Embedded = serde_json::from_value(json!({ "reviews": "oops" })).unwrap();
        assert!(e.reviews.is_empty());

        let e: Embedded = serde_json::from_value(json!({})).unwrap();
        assert!(e.reviews.is_empty());
    }

    #[test]
    fn test_serializes_null_average() {
        let v = serde_json::to_value(aggregate_ratings::<RatingRecord>(&[])).unwrap();
        assert_eq!(v, json!({"average": null, "count": 0}));
    }
}
