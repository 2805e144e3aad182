//! Session module: explicit query state with a single mutation point per user
//! action.
//!
//! A `QuerySession` owns the current selection, cached records, filters, field
//! operations, and the latest aggregated result. Each user action is one
//! method call producing the next state; rendering reads the accessors.

use crate::aggregate::{aggregate, AggregateOp, AggregatedResult, FieldOperation};
use crate::catalog::{ComparisonOp, DateInputMode, OperatorCatalog};
use crate::executor::execute;
use crate::filter::{validate, Filter, ValidatedFilter};
use crate::page::Pager;
use crate::source::DataSource;
use crate::types::{infer_kind, FieldKind, Record};
use crate::AdhoqError;
use tracing::{debug, error};

const DEFAULT_PAGE_SIZE: usize = 10;

/// Per-session query state. Single-owner and synchronous: one logical session
/// mutates it, one action at a time, so superseded-fetch races cannot occur
/// in-process. Callers that move fetches off-thread must serialize completions
/// themselves.
pub struct QuerySession<S: DataSource> {
    source: S,
    catalog: OperatorCatalog,
    database: Option<String>,
    collection: Option<String>,
    records: Vec<Record>,
    field_names: Vec<String>,
    filters: Vec<Filter>,
    operations: Vec<FieldOperation>,
    result: Option<AggregatedResult>,
    rows: Vec<Record>,
    error: Option<String>,
    loading: bool,
    field_pager: Pager,
    row_pager: Pager,
}

impl<S: DataSource> QuerySession<S> {
    pub fn new(source: S) -> Self {
        Self::with_catalog(source, OperatorCatalog::standard())
    }

    pub fn with_catalog(source: S, catalog: OperatorCatalog) -> Self {
        Self {
            source,
            catalog,
            database: None,
            collection: None,
            records: Vec::new(),
            field_names: Vec::new(),
            filters: Vec::new(),
            operations: Vec::new(),
            result: None,
            rows: Vec::new(),
            error: None,
            loading: false,
            field_pager: Pager::new(DEFAULT_PAGE_SIZE),
            row_pager: Pager::new(DEFAULT_PAGE_SIZE),
        }
    }

    /// Selects a database after probing it; clears any prior collection state.
    pub fn select_database(&mut self, name: &str) -> Result<(), AdhoqError> {
        self.source.test_connection(name).map_err(|e| {
            self.error = Some(e.to_string());
            e
        })?;
        debug!(database = name, "database selected");
        self.database = Some(name.to_string());
        self.clear_collection();
        self.error = None;
        Ok(())
    }

    /// Selects a collection: fetches its field names and a record sample for
    /// type inference, and resets filters, operations, and results.
    pub fn select_collection(&mut self, name: &str) -> Result<(), AdhoqError> {
        let database = self
            .database
            .clone()
            .ok_or_else(|| AdhoqError::Selection("no database selected".into()))?;
        self.loading = true;
        let fetched = self
            .source
            .fetch_collection(&database, name)
            .and_then(|records| {
                let names = self.source.fetch_field_names(&database, name)?;
                Ok((records, names))
            });
        self.loading = false;
        match fetched {
            Ok((records, names)) => {
                debug!(collection = name, fields = names.len(), "collection selected");
                self.collection = Some(name.to_string());
                self.records = records;
                self.field_names = names;
                self.filters.clear();
                self.operations.clear();
                self.result = None;
                self.rows.clear();
                self.error = None;
                self.field_pager.resize(self.field_names.len());
                self.row_pager.resize(0);
                Ok(())
            }
            Err(e) => {
                error!(collection = name, "collection selection failed: {}", e);
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Clears the collection selection and everything derived from it.
    pub fn clear_collection(&mut self) {
        self.collection = None;
        self.records.clear();
        self.field_names.clear();
        self.filters.clear();
        self.operations.clear();
        self.result = None;
        self.rows.clear();
        self.field_pager.resize(0);
        self.row_pager.resize(0);
    }

    /// Selects or deselects a display field. Selecting creates a raw
    /// projection operation; deselecting discards the field's operation.
    pub fn toggle_field(&mut self, field: &str) {
        if let Some(pos) = self.operations.iter().position(|op| op.field == field) {
            self.operations.remove(pos);
        } else {
            self.operations
                .push(FieldOperation::new(field, AggregateOp::None));
        }
    }

    /// Changes the aggregation for an already-selected display field.
    pub fn set_operation(&mut self, field: &str, operation: AggregateOp) -> Result<(), AdhoqError> {
        match self.operations.iter_mut().find(|op| op.field == field) {
            Some(op) => {
                op.operation = operation;
                Ok(())
            }
            None => Err(AdhoqError::Selection(format!(
                "display field '{}' is not selected",
                field
            ))),
        }
    }

    /// The inferred kind of a field, from the cached record sample.
    pub fn kind_of(&self, field: &str) -> FieldKind {
        infer_kind(&self.records, field)
    }

    /// The legal operators for a field in the given date mode; what a UI
    /// offers in its operator dropdown.
    pub fn operators_for(&self, field: &str, mode: DateInputMode) -> &[ComparisonOp] {
        self.catalog.operators_for(self.kind_of(field), mode)
    }

    /// Reconciles a previously chosen operator after the user switches fields:
    /// an operator illegal for the new field falls back to the first legal one.
    pub fn reconcile_operator(
        &self,
        current: ComparisonOp,
        field: &str,
        mode: DateInputMode,
    ) -> ComparisonOp {
        self.catalog.reconcile(current, self.kind_of(field), mode)
    }

    pub fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// Removes the filter at `index`; out-of-range is a no-op.
    pub fn remove_filter(&mut self, index: usize) {
        if index < self.filters.len() {
            self.filters.remove(index);
        }
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    /// Validates the active filters without executing; reported per-filter,
    /// first failure wins. A filter naming a field absent from the collection
    /// is rejected here, before any fetch.
    pub fn validate_filters(&self) -> Result<Vec<ValidatedFilter>, AdhoqError> {
        self.filters
            .iter()
            .map(|filter| {
                if !self.field_names.iter().any(|name| name == &filter.field) {
                    return Err(AdhoqError::Validation(format!(
                        "field '{}' does not exist in the collection",
                        filter.field
                    )));
                }
                let kind = infer_kind(&self.records, &filter.field);
                validate(filter, kind, &self.catalog)
            })
            .collect()
    }

    /// Runs the query pipeline: validate filters, execute, aggregate, and
    /// re-clamp pagination.
    ///
    /// A missing selection or a validation failure aborts before any fetch
    /// and retains prior results. A fetch failure clears prior results,
    /// records the error message, and clears the loading flag.
    pub fn run(&mut self) -> Result<(), AdhoqError> {
        let (database, collection) = match (&self.database, &self.collection) {
            (Some(db), Some(coll)) => (db.clone(), coll.clone()),
            (None, _) => return self.block("no database selected"),
            (_, None) => return self.block("no collection selected"),
        };
        if self.operations.is_empty() {
            return self.block("no display field selected");
        }

        let validated = self.validate_filters().map_err(|e| {
            self.error = Some(e.to_string());
            e
        })?;

        self.loading = true;
        let fetched = execute(&self.source, &database, &collection, &validated);
        self.loading = false;
        match fetched {
            Ok(rows) => {
                debug!(rows = rows.len(), "query pipeline complete");
                self.result = Some(aggregate(&rows, &self.operations));
                self.row_pager.resize(rows.len());
                self.rows = rows;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                error!("query failed: {}", e);
                self.result = None;
                self.rows.clear();
                self.row_pager.resize(0);
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn block(&mut self, reason: &str) -> Result<(), AdhoqError> {
        let err = AdhoqError::Selection(reason.to_string());
        self.error = Some(err.to_string());
        Err(err)
    }

    // Read surface for the presentation collaborator.

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// The current page of the field list.
    pub fn field_page(&self) -> &[String] {
        self.field_pager.page_of(&self.field_names)
    }

    pub fn field_pager_mut(&mut self) -> &mut Pager {
        &mut self.field_pager
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn operations(&self) -> &[FieldOperation] {
        &self.operations
    }

    pub fn result(&self) -> Option<&AggregatedResult> {
        self.result.as_ref()
    }

    /// The current page of the filtered result rows.
    pub fn row_page(&self) -> &[Record] {
        self.row_pager.page_of(&self.rows)
    }

    pub fn row_pager_mut(&mut self) -> &mut Pager {
        &mut self.row_pager
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregatedValue;
    use crate::source::MemoryDataSource;
    use crate::types::records_from_json;
    use serde_json::json;

    fn session() -> QuerySession<MemoryDataSource> {
        let source = MemoryDataSource::new().with_collection(
            "crm",
            "people",
            records_from_json(&json!([
                { "_id": 1, "age": 30, "admin": true },
                { "_id": 2, "age": 40, "admin": false },
                { "_id": 3, "age": 50, "admin": true },
            ])),
        );
        QuerySession::new(source)
    }

    #[test]
    fn test_selection_required_before_run() {
        let mut s = session();
        assert!(matches!(s.run(), Err(AdhoqError::Selection(_))));
        s.select_database("crm").unwrap();
        assert!(matches!(s.run(), Err(AdhoqError::Selection(_))));
        s.select_collection("people").unwrap();
        // Still blocked: no display field chosen.
        assert!(matches!(s.run(), Err(AdhoqError::Selection(_))));
        assert!(s.error_message().is_some());
    }

    #[test]
    fn test_unknown_database_rejected_at_selection() {
        let mut s = session();
        assert!(matches!(
            s.select_database("warehouse"),
            Err(AdhoqError::NotFound(_))
        ));
    }

    #[test]
    fn test_filtered_average_pipeline() {
        let mut s = session();
        s.select_database("crm").unwrap();
        s.select_collection("people").unwrap();
        s.toggle_field("age");
        s.set_operation("age", AggregateOp::Avg).unwrap();
        s.add_filter(Filter::new("admin", "equals", "true"));
        s.run().unwrap();

        assert_eq!(s.rows().len(), 2);
        assert_eq!(
            s.result().unwrap().get("age"),
            Some(&AggregatedValue::Average("40.00".into()))
        );
        assert!(s.error_message().is_none());
        assert!(!s.is_loading());
    }

    #[test]
    fn test_validation_aborts_before_fetch_and_retains_results() {
        let mut s = session();
        s.select_database("crm").unwrap();
        s.select_collection("people").unwrap();
        s.toggle_field("age");
        s.run().unwrap();
        assert!(s.result().is_some());

        s.add_filter(Filter::new("age", "contains", "3"));
        let err = s.run().unwrap_err();
        assert!(matches!(err, AdhoqError::Validation(_)));
        // Prior results survive a blocked run.
        assert!(s.result().is_some());
        assert_eq!(s.rows().len(), 3);
    }

    #[test]
    fn test_fetch_failure_clears_prior_results() {
        let mut s = session();
        s.select_database("crm").unwrap();
        s.select_collection("people").unwrap();
        s.toggle_field("age");
        s.run().unwrap();
        assert!(s.result().is_some());

        // The collection disappears between runs.
        s.collection = Some("ghosts".into());
        let err = s.run().unwrap_err();
        assert!(matches!(err, AdhoqError::NotFound(_)));
        assert!(s.result().is_none());
        assert!(s.rows().is_empty());
        assert!(s.error_message().is_some());
        assert!(!s.is_loading());
    }

    #[test]
    fn test_filter_on_unknown_field_rejected() {
        let mut s = session();
        s.select_database("crm").unwrap();
        s.select_collection("people").unwrap();
        s.toggle_field("age");
        s.add_filter(Filter::new("nosuchfield", "notequals", "x"));
        let err = s.run().unwrap_err();
        assert!(matches!(err, AdhoqError::Validation(_)), "{}", err);
        assert!(s.error_message().unwrap().contains("nosuchfield"));
        // Blocked before any fetch, so no rows were produced.
        assert!(s.rows().is_empty());
    }

    #[test]
    fn test_toggle_field_lifecycle() {
        let mut s = session();
        s.select_database("crm").unwrap();
        s.select_collection("people").unwrap();
        s.toggle_field("age");
        assert_eq!(s.operations().len(), 1);
        assert!(matches!(
            s.set_operation("admin", AggregateOp::Count),
            Err(AdhoqError::Selection(_))
        ));
        s.toggle_field("age");
        assert!(s.operations().is_empty());
    }

    #[test]
    fn test_collection_switch_resets_dependent_state() {
        let mut s = session();
        s.select_database("crm").unwrap();
        s.select_collection("people").unwrap();
        s.toggle_field("age");
        s.add_filter(Filter::new("admin", "equals", "true"));
        s.run().unwrap();

        s.select_collection("people").unwrap();
        assert!(s.filters().is_empty());
        assert!(s.operations().is_empty());
        assert!(s.result().is_none());
    }

    #[test]
    fn test_operator_dropdown_helpers() {
        let mut s = session();
        s.select_database("crm").unwrap();
        s.select_collection("people").unwrap();
        assert_eq!(s.kind_of("age"), FieldKind::Integer);
        assert_eq!(
            s.operators_for("admin", DateInputMode::Date),
            &[ComparisonOp::Equals, ComparisonOp::NotEquals]
        );
        // Switching from a string field to an integer field drops `contains`.
        assert_eq!(
            s.reconcile_operator(ComparisonOp::Contains, "age", DateInputMode::Date),
            ComparisonOp::Equals
        );
    }

    #[test]
    fn test_field_list_pagination() {
        let mut s = session();
        s.select_database("crm").unwrap();
        s.select_collection("people").unwrap();
        // Identity key is excluded from the derived field list.
        assert_eq!(s.field_names(), &["admin".to_string(), "age".to_string()]);
        assert_eq!(s.field_page().len(), 2);
        s.field_pager_mut().set_page(9);
        assert_eq!(s.field_pager_mut().current_page(), 1);
    }
}
