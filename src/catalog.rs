//! Catalog module: the static table of operators legal per inferred type and
//! date-granularity mode.
//!
//! The table is configuration, not code: `OperatorCatalogBuilder` expresses
//! any observed variant, and `OperatorCatalog::standard()` is the default one.

use crate::types::FieldKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Whether a date filter's value is interpreted as a calendar year or a full
/// date/timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateInputMode {
    #[default]
    Date,
    Year,
}

/// A comparison operator a filter may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ComparisonOp {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
    GreaterThan,
    LessThan,
    DateAfter,
    EqualsYear,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Equals => "equals",
            ComparisonOp::NotEquals => "notequals",
            ComparisonOp::Contains => "contains",
            ComparisonOp::NotContains => "notcontains",
            ComparisonOp::StartsWith => "startswith",
            ComparisonOp::EndsWith => "endswith",
            ComparisonOp::Regex => "regex",
            ComparisonOp::GreaterThan => "greaterthan",
            ComparisonOp::LessThan => "lessthan",
            ComparisonOp::DateAfter => "dateafter",
            ComparisonOp::EqualsYear => "equalsyear",
        }
    }

    /// Parses an operator name as it appears in filter input.
    pub fn parse(name: &str) -> Option<ComparisonOp> {
        let ops = [
            ComparisonOp::Equals,
            ComparisonOp::NotEquals,
            ComparisonOp::Contains,
            ComparisonOp::NotContains,
            ComparisonOp::StartsWith,
            ComparisonOp::EndsWith,
            ComparisonOp::Regex,
            ComparisonOp::GreaterThan,
            ComparisonOp::LessThan,
            ComparisonOp::DateAfter,
            ComparisonOp::EqualsYear,
        ];
        ops.into_iter().find(|op| op.as_str() == name)
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the catalog lookup discriminator for a `(kind, mode)` pair:
/// `"date_year"` when the kind is `Date` and the mode is `Year`, else the
/// kind name.
pub fn catalog_key(kind: FieldKind, mode: DateInputMode) -> &'static str {
    match (kind, mode) {
        (FieldKind::Date, DateInputMode::Year) => "date_year",
        (kind, _) => kind.as_str(),
    }
}

/// Maps `(inferred type, date mode)` to the ordered set of legal operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct OperatorCatalog {
    entries: HashMap<String, Vec<ComparisonOp>>,
}

impl OperatorCatalog {
    /// The default table.
    pub fn standard() -> Self {
        OperatorCatalogBuilder::new()
            .entry(
                "string",
                [
                    ComparisonOp::Equals,
                    ComparisonOp::NotEquals,
                    ComparisonOp::Contains,
                    ComparisonOp::NotContains,
                    ComparisonOp::StartsWith,
                    ComparisonOp::EndsWith,
                    ComparisonOp::Regex,
                ],
            )
            .entry("boolean", [ComparisonOp::Equals, ComparisonOp::NotEquals])
            .entry(
                "integer",
                [
                    ComparisonOp::Equals,
                    ComparisonOp::NotEquals,
                    ComparisonOp::GreaterThan,
                    ComparisonOp::LessThan,
                ],
            )
            .entry(
                "date",
                [
                    ComparisonOp::Equals,
                    ComparisonOp::GreaterThan,
                    ComparisonOp::LessThan,
                    ComparisonOp::DateAfter,
                ],
            )
            .entry("date_year", [ComparisonOp::EqualsYear])
            .build()
    }

    /// The ordered legal operators for a `(kind, mode)` pair; empty when the
    /// catalog has no entry for the key.
    pub fn operators_for(&self, kind: FieldKind, mode: DateInputMode) -> &[ComparisonOp] {
        self.entries
            .get(catalog_key(kind, mode))
            .map(|ops| ops.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_legal(&self, op: ComparisonOp, kind: FieldKind, mode: DateInputMode) -> bool {
        self.operators_for(kind, mode).contains(&op)
    }

    /// Keeps `current` if it is legal for the new `(kind, mode)`, otherwise
    /// falls back to the first operator of the new legal set. Used when a
    /// field selection changes under an existing operator choice.
    pub fn reconcile(
        &self,
        current: ComparisonOp,
        kind: FieldKind,
        mode: DateInputMode,
    ) -> ComparisonOp {
        let ops = self.operators_for(kind, mode);
        if ops.contains(&current) {
            current
        } else {
            ops.first().copied().unwrap_or(current)
        }
    }
}

impl Default for OperatorCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Default)]
pub struct OperatorCatalogBuilder {
    entries: HashMap<String, Vec<ComparisonOp>>,
}

impl OperatorCatalogBuilder {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn entry(
        mut self,
        key: impl Into<String>,
        ops: impl IntoIterator<Item = ComparisonOp>,
    ) -> Self {
        self.entries.insert(key.into(), ops.into_iter().collect());
        self
    }

    pub fn build(self) -> OperatorCatalog {
        OperatorCatalog {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_key_discriminator() {
        assert_eq!(catalog_key(FieldKind::Date, DateInputMode::Year), "date_year");
        assert_eq!(catalog_key(FieldKind::Date, DateInputMode::Date), "date");
        assert_eq!(catalog_key(FieldKind::Str, DateInputMode::Year), "string");
        assert_eq!(catalog_key(FieldKind::Integer, DateInputMode::Date), "integer");
        assert_eq!(catalog_key(FieldKind::Boolean, DateInputMode::Date), "boolean");
    }

    #[test]
    fn test_standard_table_shape() {
        let catalog = OperatorCatalog::standard();
        assert_eq!(
            catalog.operators_for(FieldKind::Str, DateInputMode::Date).len(),
            7
        );
        assert_eq!(
            catalog.operators_for(FieldKind::Boolean, DateInputMode::Date),
            &[ComparisonOp::Equals, ComparisonOp::NotEquals]
        );
        assert_eq!(
            catalog.operators_for(FieldKind::Date, DateInputMode::Year),
            &[ComparisonOp::EqualsYear]
        );
        assert!(catalog.is_legal(
            ComparisonOp::DateAfter,
            FieldKind::Date,
            DateInputMode::Date
        ));
        assert!(!catalog.is_legal(
            ComparisonOp::Regex,
            FieldKind::Integer,
            DateInputMode::Date
        ));
    }

    #[test]
    fn test_reconcile_falls_back_to_first() {
        let catalog = OperatorCatalog::standard();
        // Legal operator survives a kind change.
        assert_eq!(
            catalog.reconcile(ComparisonOp::Equals, FieldKind::Boolean, DateInputMode::Date),
            ComparisonOp::Equals
        );
        // Illegal operator falls back to the first of the new set.
        assert_eq!(
            catalog.reconcile(ComparisonOp::Contains, FieldKind::Integer, DateInputMode::Date),
            ComparisonOp::Equals
        );
        assert_eq!(
            catalog.reconcile(ComparisonOp::Equals, FieldKind::Date, DateInputMode::Year),
            ComparisonOp::EqualsYear
        );
    }

    #[test]
    fn test_builder_expresses_variants() {
        let compact = OperatorCatalogBuilder::new()
            .entry("string", [ComparisonOp::Equals, ComparisonOp::Contains])
            .entry("integer", [ComparisonOp::Equals])
            .build();
        assert_eq!(
            compact.operators_for(FieldKind::Str, DateInputMode::Date),
            &[ComparisonOp::Equals, ComparisonOp::Contains]
        );
        // Keys absent from the variant yield an empty legal set.
        assert!(compact
            .operators_for(FieldKind::Date, DateInputMode::Year)
            .is_empty());
    }

    #[test]
    fn test_operator_name_roundtrip() {
        for name in [
            "equals",
            "notequals",
            "contains",
            "notcontains",
            "startswith",
            "endswith",
            "regex",
            "greaterthan",
            "lessthan",
            "dateafter",
            "equalsyear",
        ] {
            let op = ComparisonOp::parse(name).expect(name);
            assert_eq!(op.as_str(), name);
        }
        assert!(ComparisonOp::parse("between").is_none());
    }
}
