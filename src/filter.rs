//! Filter module: validation and normalization of user-supplied filters.
//!
//! A filter arrives as untyped strings from the UI; `validate` checks it
//! against the operator catalog and the field's inferred kind, and produces a
//! typed, normalized form ready for execution. Rules apply in order, first
//! failure wins.

use crate::catalog::{catalog_key, ComparisonOp, DateInputMode, OperatorCatalog};
use crate::types::{parse_iso_timestamp, FieldKind};
use crate::AdhoqError;
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static YEAR_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("static pattern"));
static DAY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static pattern"));

/// A user-built filter, not yet validated. Multiple filters combine with
/// logical AND.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: String,
    pub value: String,
    #[serde(default)]
    pub date_input_mode: DateInputMode,
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
            date_input_mode: DateInputMode::Date,
        }
    }

    pub fn with_mode(mut self, mode: DateInputMode) -> Self {
        self.date_input_mode = mode;
        self
    }
}

/// The typed operand a validated filter compares against.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Operand {
    /// Lower-cased text for case-insensitive string matching.
    Text(String),
    /// A regular expression compiled once at validation time; equality
    /// compares the source pattern.
    Pattern(Regex),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
    Year(i32),
}

impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operand::Text(a), Operand::Text(b)) => a == b,
            (Operand::Pattern(a), Operand::Pattern(b)) => a.as_str() == b.as_str(),
            (Operand::Number(a), Operand::Number(b)) => a == b,
            (Operand::Bool(a), Operand::Bool(b)) => a == b,
            (Operand::Date(a), Operand::Date(b)) => a == b,
            (Operand::Year(a), Operand::Year(b)) => a == b,
            _ => false,
        }
    }
}

/// A filter that passed validation: normalized value, parsed operand, and the
/// kind it was validated against.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFilter {
    pub field: String,
    pub operator: ComparisonOp,
    pub kind: FieldKind,
    pub value: String,
    pub operand: Operand,
}

impl ValidatedFilter {
    /// Wire form sent to a remote data source.
    pub fn to_spec(&self) -> FilterSpec {
        FilterSpec {
            field: self.field.clone(),
            operator: self.operator.as_str().to_string(),
            value: self.value.clone(),
        }
    }
}

/// Wire form of a validated filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub field: String,
    pub operator: String,
    pub value: String,
}

/// Validates `filter` against the field's inferred kind and the catalog.
pub fn validate(
    filter: &Filter,
    kind: FieldKind,
    catalog: &OperatorCatalog,
) -> Result<ValidatedFilter, AdhoqError> {
    if filter.field.is_empty() {
        return Err(AdhoqError::Validation("filter field must not be empty".into()));
    }
    if filter.value.is_empty() {
        return Err(AdhoqError::Validation("filter value must not be empty".into()));
    }

    let mode = filter.date_input_mode;
    let operator = ComparisonOp::parse(&filter.operator)
        .filter(|op| catalog.is_legal(*op, kind, mode))
        .ok_or_else(|| {
            AdhoqError::Validation(format!(
                "unsupported operator '{}' for type {}",
                filter.operator,
                catalog_key(kind, mode)
            ))
        })?;

    let (value, operand) = match kind {
        FieldKind::Integer => normalize_integer(&filter.value)?,
        FieldKind::Boolean => normalize_boolean(&filter.value)?,
        FieldKind::Str if operator == ComparisonOp::Regex => normalize_pattern(&filter.value)?,
        FieldKind::Str => {
            // Case-folded so downstream matching is case-insensitive.
            let lowered = filter.value.to_lowercase();
            (lowered.clone(), Operand::Text(lowered))
        }
        FieldKind::Date => normalize_date(&filter.value, mode)?,
    };

    Ok(ValidatedFilter {
        field: filter.field.clone(),
        operator,
        kind,
        value,
        operand,
    })
}

fn normalize_integer(raw: &str) -> Result<(String, Operand), AdhoqError> {
    let parsed: f64 = raw
        .trim()
        .parse()
        .map_err(|_| AdhoqError::Validation(format!("'{}' is not a number", raw)))?;
    let normalized = if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 {
        format!("{}", parsed as i64)
    } else {
        format!("{}", parsed)
    };
    Ok((normalized, Operand::Number(parsed)))
}

fn normalize_boolean(raw: &str) -> Result<(String, Operand), AdhoqError> {
    match raw.to_lowercase().as_str() {
        "true" => Ok(("true".into(), Operand::Bool(true))),
        "false" => Ok(("false".into(), Operand::Bool(false))),
        _ => Err(AdhoqError::Validation(format!(
            "'{}' is not a boolean (expected true or false)",
            raw
        ))),
    }
}

fn normalize_pattern(raw: &str) -> Result<(String, Operand), AdhoqError> {
    let re = Regex::new(raw)
        .map_err(|e| AdhoqError::Validation(format!("invalid regular expression: {}", e)))?;
    Ok((raw.to_string(), Operand::Pattern(re)))
}

fn normalize_date(raw: &str, mode: DateInputMode) -> Result<(String, Operand), AdhoqError> {
    let raw = raw.trim();
    if YEAR_VALUE.is_match(raw) {
        if mode == DateInputMode::Date {
            return Err(AdhoqError::Validation(format!(
                "'{}' is a bare year; switch the date input mode to year",
                raw
            )));
        }
        let year: i32 = raw
            .parse()
            .map_err(|_| AdhoqError::Validation(format!("'{}' is not a valid year", raw)))?;
        return Ok((raw.to_string(), Operand::Year(year)));
    }
    if DAY_VALUE.is_match(raw) {
        if mode == DateInputMode::Year {
            return Err(AdhoqError::Validation(format!(
                "'{}' is a full date; year mode expects a 4-digit year",
                raw
            )));
        }
        let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| AdhoqError::Validation(format!("'{}' is not a valid date", raw)))?;
        let midnight = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AdhoqError::Validation(format!("'{}' is not a valid date", raw)))?;
        return Ok((format!("{}T00:00:00", raw), Operand::Date(midnight)));
    }
    if let Some(dt) = parse_iso_timestamp(raw) {
        if mode == DateInputMode::Year {
            return Err(AdhoqError::Validation(format!(
                "'{}' is a timestamp; year mode expects a 4-digit year",
                raw
            )));
        }
        return Ok((raw.to_string(), Operand::Date(dt)));
    }
    Err(AdhoqError::Validation(format!(
        "'{}' is not a valid date value (expected YYYY, YYYY-MM-DD, or an ISO-8601 timestamp)",
        raw
    )))
}
