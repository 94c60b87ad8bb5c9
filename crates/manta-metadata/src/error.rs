//! Error types for schema validation.

use thiserror::Error;

/// Errors raised when a specification is inconsistent or incomplete.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A required object (table, view, column) was missing or undefined.
    #[error("object missing or undefined")]
    MissingObject,

    /// A table or view name failed identifier validation.
    #[error("invalid table or view name: {0:?}")]
    InvalidTableOrViewName(String),

    /// A column name failed identifier validation.
    #[error("invalid column name: {0:?}")]
    InvalidColumnName(String),

    /// The table declares no partitioning key.
    #[error("table {0:?} has no partitioning key")]
    NoPartitioningKey(String),

    /// A partitioning/clustering/index entry references a column that is not
    /// in the column list.
    #[error("column {column:?} referenced by {referrer} is not declared on {table:?}")]
    MismatchedColumns {
        table: String,
        column: String,
        referrer: &'static str,
    },

    /// A column's key flags disagree with the key lists, or a column carries
    /// both key flags, or a column has no CQL type.
    #[error("inconsistent metadata for column {column:?} on {table:?}: {detail}")]
    InconsistentMetadata {
        table: String,
        column: String,
        detail: &'static str,
    },

    /// The view key layout is unsuitable: it must contain every base-table
    /// key column, plus at most one extra column.
    #[error("view {view:?} keys unsuitable: {detail}")]
    ViewKeyUnsuitable { view: String, detail: String },
}
