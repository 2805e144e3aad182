//! Aggregate module: computes per-field results over a (filtered) record set.
//!
//! Each selected display field carries one operation: raw projection, count by
//! value, average, or percentage by value. Grouping keys keep the insertion
//! order of first occurrence so downstream chart rendering is stable.

use crate::types::{infer_kind, FieldKind, Record, ScalarValue};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bucket label for records where the grouped field is null or absent.
pub const UNKNOWN_BUCKET: &str = "unknown";

/// The aggregation applied to one display field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    #[default]
    None,
    Count,
    Avg,
    Percentage,
}

/// One per selected display field; created when the field is selected,
/// discarded when deselected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOperation {
    pub field: String,
    pub operation: AggregateOp,
}

impl FieldOperation {
    pub fn new(field: impl Into<String>, operation: AggregateOp) -> Self {
        Self {
            field: field.into(),
            operation,
        }
    }
}

/// A value→count grouping whose key order is the insertion order of first
/// occurrence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupCounts {
    keys: Vec<String>,
    counts: HashMap<String, u64>,
}

impl GroupCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: String) {
        if !self.counts.contains_key(&key) {
            self.keys.push(key.clone());
        }
        *self.counts.entry(key).or_insert(0) += 1;
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Buckets in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.keys
            .iter()
            .map(move |key| (key.as_str(), self.counts[key]))
    }
}

/// The computed result for one display field.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AggregatedValue {
    /// Ordered raw projection, record order preserved.
    Values(Vec<ScalarValue>),
    /// Distinct value → occurrence count.
    Counts(GroupCounts),
    /// Average formatted to two decimals, e.g. `"40.00"`.
    Average(String),
    /// Distinct value → percentage string, e.g. `"66.67%"`, insertion order.
    Percentages(Vec<(String, String)>),
}

/// Per-field results of one query execution. The key set equals the fields
/// named by the active field operations, in operation order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatedResult {
    entries: Vec<(String, AggregatedValue)>,
}

impl AggregatedResult {
    pub fn get(&self, field: &str) -> Option<&AggregatedValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AggregatedValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Computes one aggregated value per field operation over `records`.
pub fn aggregate(records: &[Record], operations: &[FieldOperation]) -> AggregatedResult {
    let entries = operations
        .iter()
        .map(|op| {
            let value = match op.operation {
                AggregateOp::None => AggregatedValue::Values(project(records, &op.field)),
                AggregateOp::Count => AggregatedValue::Counts(count_by_value(records, &op.field)),
                AggregateOp::Avg => AggregatedValue::Average(average(records, &op.field)),
                AggregateOp::Percentage => {
                    AggregatedValue::Percentages(percentages(records, &op.field))
                }
            };
            (op.field.clone(), value)
        })
        .collect();
    AggregatedResult { entries }
}

fn project(records: &[Record], field: &str) -> Vec<ScalarValue> {
    records
        .iter()
        .map(|record| record.get(field).cloned().unwrap_or(ScalarValue::Null))
        .collect()
}

/// The grouping key for a scalar: null/absent map to the unknown bucket,
/// dates truncate to the calendar day, strings are case-folded.
fn group_key(value: Option<&ScalarValue>) -> String {
    match value {
        None | Some(ScalarValue::Null) => UNKNOWN_BUCKET.to_string(),
        Some(ScalarValue::DateTime(dt)) => dt.format("%Y-%m-%d").to_string(),
        Some(ScalarValue::Str(s)) => s.to_lowercase(),
        Some(other) => other.to_string(),
    }
}

/// Groups records by the normalized value of `field`.
pub fn count_by_value(records: &[Record], field: &str) -> GroupCounts {
    let mut counts = GroupCounts::new();
    for record in records {
        counts.increment(group_key(record.get(field)));
    }
    counts
}

/// Sum of parseable numeric values divided by their count, formatted to two
/// decimals. Non-numeric entries are skipped; zero parseable values average
/// to zero. Fields not inferred as integer yield a descriptive placeholder.
fn average(records: &[Record], field: &str) -> String {
    if infer_kind(records, field) != FieldKind::Integer {
        return "n/a (non-numeric field)".to_string();
    }
    let values: Vec<f64> = records
        .iter()
        .filter_map(|record| record.get(field))
        .filter_map(|value| value.as_f64())
        .collect();
    if values.is_empty() {
        return "0.00".to_string();
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    format!("{:.2}", avg)
}

/// Each bucket's share of the count grouping, formatted as `"NN.NN%"`.
fn percentages(records: &[Record], field: &str) -> Vec<(String, String)> {
    let counts = count_by_value(records, field);
    let total = counts.total();
    counts
        .iter()
        .map(|(key, count)| {
            let share = if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            };
            (key.to_string(), format!("{:.2}%", share))
        })
        .collect()
}

/// Groups date values of `field` into calendar quarters, keyed `"YYYY-Tq"`.
/// Non-date and absent values are skipped.
pub fn count_by_quarter(records: &[Record], field: &str) -> GroupCounts {
    let mut counts = GroupCounts::new();
    for record in records {
        if let Some(ScalarValue::DateTime(dt)) = record.get(field) {
            let quarter = (dt.month() + 2) / 3;
            counts.increment(format!("{}-T{}", dt.year(), quarter));
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::records_from_json;
    use serde_json::json;

    fn people() -> Vec<Record> {
        records_from_json(&json!([
            { "name": "alice", "age": 30, "city": "paris",  "joined": "2024-03-05T10:15:00" },
            { "name": "bob",   "age": 40, "city": "lyon",   "joined": "2024-03-05T23:00:00" },
            { "name": "carol", "age": 50, "city": "paris",  "joined": "2023-11-20T08:00:00" },
            { "name": "dave",  "age": 44, "city": null,     "joined": "2024-07-01T00:00:00" },
        ]))
    }

    #[test]
    fn test_result_keys_match_operations() {
        let ops = vec![
            FieldOperation::new("city", AggregateOp::Count),
            FieldOperation::new("age", AggregateOp::Avg),
        ];
        let result = aggregate(&people(), &ops);
        let fields: Vec<&str> = result.fields().collect();
        assert_eq!(fields, vec!["city", "age"]);
    }

    #[test]
    fn test_projection_preserves_record_order() {
        let ops = vec![FieldOperation::new("name", AggregateOp::None)];
        let result = aggregate(&people(), &ops);
        match result.get("name").unwrap() {
            AggregatedValue::Values(values) => {
                assert_eq!(values.len(), 4);
                assert_eq!(values[0], ScalarValue::Str("alice".into()));
                assert_eq!(values[3], ScalarValue::Str("dave".into()));
            }
            other => panic!("expected values, got {:?}", other),
        }
    }

    #[test]
    fn test_count_buckets_and_unknown() {
        let counts = count_by_value(&people(), "city");
        assert_eq!(counts.get("paris"), 2);
        assert_eq!(counts.get("lyon"), 1);
        assert_eq!(counts.get(UNKNOWN_BUCKET), 1);
        // Insertion order of first occurrence.
        let keys: Vec<&str> = counts.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["paris", "lyon", UNKNOWN_BUCKET]);
    }

    #[test]
    fn test_count_total_equals_record_count() {
        let records = people();
        for field in ["city", "name", "joined", "missing"] {
            let counts = count_by_value(&records, field);
            assert_eq!(counts.total(), records.len() as u64, "{}", field);
        }
    }

    #[test]
    fn test_count_truncates_dates_to_day() {
        let counts = count_by_value(&people(), "joined");
        assert_eq!(counts.get("2024-03-05"), 2);
        assert_eq!(counts.get("2023-11-20"), 1);
    }

    #[test]
    fn test_average_two_decimals() {
        let ops = vec![FieldOperation::new("age", AggregateOp::Avg)];
        let result = aggregate(&people(), &ops);
        assert_eq!(
            result.get("age"),
            Some(&AggregatedValue::Average("41.00".into()))
        );
    }

    #[test]
    fn test_average_skips_unparseable_and_handles_empty() {
        let records = records_from_json(&json!([
            { "score": 10 },
            { "score": "broken" },
            { "score": 20 },
        ]));
        let ops = vec![FieldOperation::new("score", AggregateOp::Avg)];
        assert_eq!(
            aggregate(&records, &ops).get("score"),
            Some(&AggregatedValue::Average("15.00".into()))
        );

        let none = records_from_json(&json!([{ "other": 1 }]));
        // No parseable values: inferred as string, so the placeholder applies.
        assert_eq!(
            aggregate(&none, &ops).get("score"),
            Some(&AggregatedValue::Average("n/a (non-numeric field)".into()))
        );
    }

    #[test]
    fn test_average_placeholder_for_non_integer_field() {
        let ops = vec![FieldOperation::new("city", AggregateOp::Avg)];
        assert_eq!(
            aggregate(&people(), &ops).get("city"),
            Some(&AggregatedValue::Average("n/a (non-numeric field)".into()))
        );
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let ops = vec![FieldOperation::new("city", AggregateOp::Percentage)];
        let result = aggregate(&people(), &ops);
        match result.get("city").unwrap() {
            AggregatedValue::Percentages(buckets) => {
                assert_eq!(buckets.len(), 3);
                let sum: f64 = buckets
                    .iter()
                    .map(|(_, pct)| pct.trim_end_matches('%').parse::<f64>().unwrap())
                    .sum();
                assert!((sum - 100.0).abs() <= 0.02 * buckets.len() as f64);
            }
            other => panic!("expected percentages, got {:?}", other),
        }
    }

    #[test]
    fn test_quarter_grouping() {
        let counts = count_by_quarter(&people(), "joined");
        assert_eq!(counts.get("2024-T1"), 2);
        assert_eq!(counts.get("2023-T4"), 1);
        assert_eq!(counts.get("2024-T3"), 1);
        // Records without a date value are skipped, not bucketed.
        assert_eq!(count_by_quarter(&people(), "city").total(), 0);
    }
}
