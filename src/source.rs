//! Source module: the abstract data-source boundary and an in-memory implementation.
//!
//! The engine consumes collections through the `DataSource` trait; errors from
//! this boundary classify as `NotFound` (database/collection absent) or
//! `Server` (anything else) and abort the current query.

use crate::executor::{apply_local, revalidate_spec};
use crate::filter::FilterSpec;
use crate::types::{derive_field_names, Record, ScalarValue};
use crate::AdhoqError;
use std::collections::HashMap;

/// The one capability the engine requires from its environment.
pub trait DataSource {
    /// Fetches the full contents of a collection.
    fn fetch_collection(&self, database: &str, collection: &str)
        -> Result<Vec<Record>, AdhoqError>;

    /// Fetches a collection with filtering delegated to the source. Filters
    /// combine with logical AND.
    fn fetch_filtered_collection(
        &self,
        database: &str,
        collection: &str,
        filters: &[FilterSpec],
    ) -> Result<Vec<Record>, AdhoqError>;

    /// The field names of a collection. The default derives them from fetched
    /// records, excluding the internal identity key.
    fn fetch_field_names(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Vec<String>, AdhoqError> {
        let records = self.fetch_collection(database, collection)?;
        Ok(derive_field_names(&records))
    }

    /// Distinct values of a field, in order of first occurrence.
    fn fetch_distinct_values(
        &self,
        database: &str,
        collection: &str,
        field: &str,
    ) -> Result<Vec<ScalarValue>, AdhoqError> {
        let records = self.fetch_collection(database, collection)?;
        let mut seen = Vec::new();
        for record in &records {
            match record.get(field) {
                Some(value) if !value.is_null() && !seen.contains(value) => {
                    seen.push(value.clone());
                }
                _ => {}
            }
        }
        Ok(seen)
    }

    /// The databases this source can serve.
    fn list_databases(&self) -> Result<Vec<String>, AdhoqError>;

    /// Probes connectivity to a database, returning a human-readable status.
    fn test_connection(&self, database: &str) -> Result<String, AdhoqError> {
        self.list_databases()?
            .iter()
            .any(|name| name == database)
            .then(|| format!("connection to '{}' succeeded", database))
            .ok_or_else(|| AdhoqError::NotFound(format!("database '{}' not found", database)))
    }
}

/// An in-memory data source for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataSource {
    databases: HashMap<String, HashMap<String, Vec<Record>>>,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(
        mut self,
        database: impl Into<String>,
        collection: impl Into<String>,
        records: Vec<Record>,
    ) -> Self {
        self.insert_collection(database, collection, records);
        self
    }

    pub fn insert_collection(
        &mut self,
        database: impl Into<String>,
        collection: impl Into<String>,
        records: Vec<Record>,
    ) {
        self.databases
            .entry(database.into())
            .or_default()
            .insert(collection.into(), records);
    }

    fn collection(&self, database: &str, collection: &str) -> Result<&Vec<Record>, AdhoqError> {
        let db = self
            .databases
            .get(database)
            .ok_or_else(|| AdhoqError::NotFound(format!("database '{}' not found", database)))?;
        db.get(collection).ok_or_else(|| {
            AdhoqError::NotFound(format!(
                "collection '{}' not found in database '{}'",
                collection, database
            ))
        })
    }
}

impl DataSource for MemoryDataSource {
    fn fetch_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Vec<Record>, AdhoqError> {
        Ok(self.collection(database, collection)?.clone())
    }

    fn fetch_filtered_collection(
        &self,
        database: &str,
        collection: &str,
        filters: &[FilterSpec],
    ) -> Result<Vec<Record>, AdhoqError> {
        let records = self.collection(database, collection)?;
        let validated = filters
            .iter()
            .map(|spec| revalidate_spec(spec, records))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(apply_local(records, &validated))
    }

    fn list_databases(&self) -> Result<Vec<String>, AdhoqError> {
        let mut names: Vec<String> = self.databases.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
