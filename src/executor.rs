//! Executor module: applies validated filters to record sets and runs queries
//! against a data source.
//!
//! Filtering is delegated to the data source when filters are present; the
//! local evaluator below is the semantics reference and backs the in-memory
//! source. All filters combine with logical AND.

use crate::catalog::{ComparisonOp, DateInputMode, OperatorCatalog};
use crate::filter::{validate, Filter, FilterSpec, Operand, ValidatedFilter};
use crate::source::DataSource;
use crate::types::{infer_kind, Record, ScalarValue};
use crate::AdhoqError;
use chrono::Datelike;
use regex::Regex;
use tracing::debug;

/// Runs a query: fetch the full collection when no filters are active,
/// otherwise delegate filtering to the source. String values in the result are
/// normalized to lower case for consistent downstream counting.
///
/// An empty result set is not an error; a missing database or collection is.
pub fn execute(
    source: &dyn DataSource,
    database: &str,
    collection: &str,
    filters: &[ValidatedFilter],
) -> Result<Vec<Record>, AdhoqError> {
    let records = if filters.is_empty() {
        source.fetch_collection(database, collection)?
    } else {
        let specs: Vec<FilterSpec> = filters.iter().map(ValidatedFilter::to_spec).collect();
        source.fetch_filtered_collection(database, collection, &specs)?
    };
    debug!(
        database,
        collection,
        filters = filters.len(),
        rows = records.len(),
        "query executed"
    );
    Ok(normalize_strings(records))
}

/// Applies `filters` conjunctively to an in-memory record set.
pub fn apply_local(records: &[Record], filters: &[ValidatedFilter]) -> Vec<Record> {
    records
        .iter()
        .filter(|record| filters.iter().all(|f| matches_record(record, f)))
        .cloned()
        .collect()
}

/// Evaluates one filter against one record. Absent or null fields never match.
pub fn matches_record(record: &Record, filter: &ValidatedFilter) -> bool {
    let value = match record.get(&filter.field) {
        Some(v) if !v.is_null() => v,
        _ => return false,
    };
    match &filter.operand {
        Operand::Text(needle) => cmp_text(value, needle, filter.operator),
        Operand::Pattern(re) => cmp_pattern(value, re),
        Operand::Number(n) => cmp_number(value, *n, filter.operator),
        Operand::Bool(b) => cmp_bool(value, *b, filter.operator),
        Operand::Date(d) => cmp_date(value, d, filter.operator),
        Operand::Year(y) => cmp_year(value, *y, filter.operator),
    }
}

/// Rebuilds a validated filter from its wire form, inferring the field kind
/// from the record set. Used by sources that receive `FilterSpec`s.
pub fn revalidate_spec(
    spec: &FilterSpec,
    records: &[Record],
) -> Result<ValidatedFilter, AdhoqError> {
    let mode = if spec.operator == ComparisonOp::EqualsYear.as_str() {
        DateInputMode::Year
    } else {
        DateInputMode::Date
    };
    let filter = Filter::new(&spec.field, &spec.operator, &spec.value).with_mode(mode);
    let kind = infer_kind(records, &spec.field);
    validate(&filter, kind, &OperatorCatalog::standard())
}

fn normalize_strings(mut records: Vec<Record>) -> Vec<Record> {
    for record in &mut records {
        for value in record.values_mut() {
            if let ScalarValue::Str(s) = value {
                *s = s.to_lowercase();
            }
        }
    }
    records
}

// Case-insensitive string comparisons; the needle is already lower-cased.
fn cmp_text(value: &ScalarValue, needle: &str, op: ComparisonOp) -> bool {
    let haystack = value.to_string().to_lowercase();
    match op {
        ComparisonOp::Equals => haystack == needle,
        ComparisonOp::NotEquals => haystack != needle,
        ComparisonOp::Contains => haystack.contains(needle),
        ComparisonOp::NotContains => !haystack.contains(needle),
        ComparisonOp::StartsWith => haystack.starts_with(needle),
        ComparisonOp::EndsWith => haystack.ends_with(needle),
        _ => false,
    }
}

fn cmp_pattern(value: &ScalarValue, re: &Regex) -> bool {
    match value {
        ScalarValue::Str(s) => re.is_match(s),
        _ => false,
    }
}

fn cmp_number(value: &ScalarValue, n: f64, op: ComparisonOp) -> bool {
    let v = match value.as_f64() {
        Some(v) => v,
        None => return false,
    };
    match op {
        ComparisonOp::Equals => v == n,
        ComparisonOp::NotEquals => v != n,
        ComparisonOp::GreaterThan => v > n,
        ComparisonOp::LessThan => v < n,
        _ => false,
    }
}

fn cmp_bool(value: &ScalarValue, b: bool, op: ComparisonOp) -> bool {
    match (value, op) {
        (ScalarValue::Bool(v), ComparisonOp::Equals) => *v == b,
        (ScalarValue::Bool(v), ComparisonOp::NotEquals) => *v != b,
        _ => false,
    }
}

fn cmp_date(value: &ScalarValue, d: &chrono::NaiveDateTime, op: ComparisonOp) -> bool {
    let v = match value {
        ScalarValue::DateTime(v) => v,
        _ => return false,
    };
    match op {
        ComparisonOp::Equals => v == d,
        ComparisonOp::GreaterThan => v > d,
        ComparisonOp::LessThan => v < d,
        // Day-granular, strictly after the given calendar day.
        ComparisonOp::DateAfter => v.date() > d.date(),
        _ => false,
    }
}

fn cmp_year(value: &ScalarValue, year: i32, op: ComparisonOp) -> bool {
    match (value, op) {
        (ScalarValue::DateTime(v), ComparisonOp::EqualsYear) => v.year() == year,
        _ => false,
    }
}
