//! Adhoq: an embeddable ad-hoc query and aggregation engine for schema-less record collections.
//!
//! The crate lets a caller pick a collection, arbitrary fields, type-aware filter
//! operators, and aggregation operations (raw projection, count, average, percentage),
//! then hands back tabular, paginated results.
//!
//! # Architecture
//! - Scalar model and type inference over sampled records
//! - Operator catalog (legal operators per inferred type and date mode)
//! - Filter validation and normalization
//! - Query execution against a pluggable data source
//! - Aggregation with insertion-order-stable grouping
//! - Pagination helpers and an explicit per-session query state

mod aggregate;
mod catalog;
mod executor;
mod filter;
mod page;
mod session;
mod source;
mod types;

pub use aggregate::*;
pub use catalog::*;
pub use executor::*;
pub use filter::*;
pub use page::*;
pub use session::*;
pub use source::*;
pub use types::*;

use thiserror::Error;

/// Unified error type for Adhoq operations.
///
/// Every error is terminal for the current operation; the next caller action is
/// the only recovery path.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdhoqError {
    /// A required prior selection (database, collection, display field) is missing.
    #[error("Selection error: {0}")]
    Selection(String),
    /// A filter failed operator-catalog or normalization checks.
    #[error("Validation error: {0}")]
    Validation(String),
    /// The requested database or collection does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The data source failed for any reason other than a missing target.
    #[error("Server error: {0}")]
    Server(String),
    /// A presentation collaborator (chart/PDF) failed; query state is unaffected.
    #[error("Render error: {0}")]
    Render(String),
}
