//! Types module: the scalar model, record representation, and type inference.
//!
//! Records are schema-less maps from field name to a tagged scalar value; field
//! kinds are inferred by sampling records, never assumed fixed.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Internal identity key injected by document stores; excluded from derived field lists.
pub const IDENTITY_KEY: &str = "_id";

/// Fixed ISO-8601 timestamp shape: `YYYY-MM-DDTHH:mm:ss[.sss][Z|±HH:mm]`.
static ISO_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d{1,3})?(Z|[+-]\d{2}:\d{2})?$")
        .expect("static pattern")
});

/// A dynamically-typed scalar carried by a record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ScalarValue {
    Str(String),
    Int(i64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Null,
}

/// The scalar classification derived from sampling records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum FieldKind {
    Str,
    Integer,
    Boolean,
    Date,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Str => "string",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schema-less record: field presence and type may vary across records in
/// the same collection.
pub type Record = HashMap<String, ScalarValue>;

/// Parses a string of the fixed ISO-8601 timestamp shape into a naive datetime.
/// Zone suffixes are stripped, not applied; comparisons are wall-clock.
pub fn parse_iso_timestamp(s: &str) -> Option<NaiveDateTime> {
    if !ISO_TIMESTAMP.is_match(s) {
        return None;
    }
    let trimmed = if let Some(stripped) = s.strip_suffix('Z') {
        stripped
    } else if s.len() > 19 && (s.as_bytes()[s.len() - 6] == b'+' || s.as_bytes()[s.len() - 6] == b'-') {
        &s[..s.len() - 6]
    } else {
        s
    };
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

impl ScalarValue {
    /// Classifies this value, or `None` for `Null` (inference skips nulls).
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            ScalarValue::Str(_) => Some(FieldKind::Str),
            ScalarValue::Int(_) => Some(FieldKind::Integer),
            ScalarValue::Bool(_) => Some(FieldKind::Boolean),
            ScalarValue::DateTime(_) => Some(FieldKind::Date),
            ScalarValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Converts a JSON value into the tagged scalar model.
    ///
    /// Whole numbers become `Int`; other numbers are carried as their string
    /// form. Timestamp-shaped strings become `DateTime`. Arrays and objects
    /// are flattened to their JSON text (the engine treats them as opaque).
    pub fn from_json(value: &serde_json::Value) -> ScalarValue {
        match value {
            serde_json::Value::Null => ScalarValue::Null,
            serde_json::Value::Bool(b) => ScalarValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ScalarValue::Int(i)
                } else {
                    ScalarValue::Str(n.to_string())
                }
            }
            serde_json::Value::String(s) => match parse_iso_timestamp(s) {
                Some(dt) => ScalarValue::DateTime(dt),
                None => ScalarValue::Str(s.clone()),
            },
            other => ScalarValue::Str(other.to_string()),
        }
    }

    /// Numeric view of this value, if it has one. Used by average computation,
    /// which skips entries without one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(i) => Some(*i as f64),
            ScalarValue::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Str(s) => f.write_str(s),
            ScalarValue::Int(i) => write!(f, "{}", i),
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            ScalarValue::Null => f.write_str("null"),
        }
    }
}

/// Converts a JSON object into a record. Non-objects yield `None`.
pub fn record_from_json(value: &serde_json::Value) -> Option<Record> {
    let obj = value.as_object()?;
    Some(
        obj.iter()
            .map(|(k, v)| (k.clone(), ScalarValue::from_json(v)))
            .collect(),
    )
}

/// Converts a JSON array of objects into records, skipping non-objects.
pub fn records_from_json(value: &serde_json::Value) -> Vec<Record> {
    match value.as_array() {
        Some(items) => items.iter().filter_map(record_from_json).collect(),
        None => Vec::new(),
    }
}

/// Infers the kind of `field` from the first record where it is present and
/// non-null. No occurrence, or an empty field name, yields `Str`.
///
/// This is a single-sample heuristic: it does not detect mixed-type fields and
/// misclassifies a field whose first present value is atypical.
pub fn infer_kind(records: &[Record], field: &str) -> FieldKind {
    if field.is_empty() {
        return FieldKind::Str;
    }
    records
        .iter()
        .filter_map(|record| record.get(field))
        .find_map(|value| value.kind())
        .unwrap_or(FieldKind::Str)
}

/// Derives the sorted set of field names present across `records`, excluding
/// the internal identity key. Fallback for sources without field metadata.
pub fn derive_field_names(records: &[Record]) -> Vec<String> {
    let mut names: Vec<String> = records
        .iter()
        .flat_map(|record| record.keys())
        .filter(|name| *name != IDENTITY_KEY)
        .cloned()
        .collect();
    names.sort();
    names.dedup();
    names
}
