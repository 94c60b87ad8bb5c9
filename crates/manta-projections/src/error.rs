//! Error types for projection management.

use std::fmt;

use manta_tables::TableError;
use thiserror::Error;

/// The fan-out phase an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOutStage {
    /// Deleting rows at their old projection coordinates.
    Cleanup,
    /// Writing rows at their new projection coordinates.
    Write,
}

impl fmt::Display for FanOutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanOutStage::Cleanup => write!(f, "cleanup"),
            FanOutStage::Write => write!(f, "write"),
        }
    }
}

/// Errors raised by a projection manager.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An operation against the control table failed.
    #[error("control table operation failed: {source}")]
    Control {
        #[source]
        source: TableError,
    },

    /// A projection task failed during a fan-out. Sibling tasks were
    /// cancelled; tasks that already committed are not rolled back.
    #[error("projection {projection:?} failed during {stage}: {source}")]
    FanOut {
        stage: FanOutStage,
        projection: String,
        #[source]
        source: TableError,
    },

    /// A projection declaration references a column the base table does not
    /// declare.
    #[error("unknown column {column:?} referenced by projection {projection:?}")]
    UnknownColumn { projection: String, column: String },

    /// A projection's key set does not cover every base-table key column.
    #[error("projection {projection:?} must include all base key columns; missing {columns:?}")]
    MissingKeyColumns {
        projection: String,
        columns: Vec<String>,
    },

    /// A projection keys on a non-key base column that is not tracked, so
    /// the control record could not locate its rows for cleanup.
    #[error("projection {projection:?} keys on untracked non-key column {column:?}")]
    UntrackedKeyColumn { projection: String, column: String },

    /// A tracked column name does not resolve to a non-key base column.
    #[error("tracked column {column:?} is not a non-key column of the base table")]
    InvalidTrackedColumn { column: String },

    /// The stored control record is missing a column a projection keys on.
    #[error("control record is missing column {column:?} needed by projection {projection:?}")]
    ControlRecordIncomplete { projection: String, column: String },

    /// Key extraction or another table-layer failure outside a fan-out.
    #[error(transparent)]
    Table(#[from] TableError),
}
