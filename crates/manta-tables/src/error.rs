//! Error types for table operations.

use manta_cql::SessionError;
use manta_ddl::DdlError;
use manta_metadata::MetadataError;
use thiserror::Error;

use crate::hooks::HookStage;

/// Boxed error type returned by hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by table and view managers.
#[derive(Debug, Error)]
pub enum TableError {
    /// A conditional write executed but its compare-and-set did not hold:
    /// the row existed when it should not have, or did not exist / did not
    /// match when it should have.
    #[error("precondition failed for conditional write")]
    PreconditionFailed,

    /// The write's attempt loop exhausted its deadline.
    #[error("{operation} on {table} exceeded its deadline")]
    Timeout {
        operation: &'static str,
        table: String,
    },

    /// A non-retryable session failure, wrapped with the operation and table
    /// it occurred in.
    #[error("{operation} on {table} failed: {source}")]
    Session {
        operation: &'static str,
        table: String,
        #[source]
        source: SessionError,
    },

    /// A hook failed. For the pre stages this aborts before any mutation;
    /// for the post stage the underlying write has already committed.
    #[error("{stage} hook at index {index} failed: {source}")]
    Hook {
        stage: HookStage,
        index: usize,
        #[source]
        source: BoxError,
    },

    /// A record could not be converted to or from its row form.
    #[error("mapping error on {table}: {detail}")]
    Mapping { table: String, detail: String },

    /// A point operation received the wrong number of key values.
    #[error("invalid key for {table}: expected {expected} values, got {got}")]
    InvalidKey {
        table: String,
        expected: usize,
        got: usize,
    },

    /// Per-call options failed validation.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The operation is not expressible against this table's layout.
    #[error("unsupported operation on {table}: {detail}")]
    Unsupported { table: String, detail: String },

    /// The table or view specification failed validation.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Schema installation failed at construction time.
    #[error(transparent)]
    Ddl(#[from] DdlError),
}

impl TableError {
    pub(crate) fn mapping(table: &str, detail: impl Into<String>) -> Self {
        TableError::Mapping {
            table: table.to_string(),
            detail: detail.into(),
        }
    }
}
