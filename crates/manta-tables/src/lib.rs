//! # manta-tables
//!
//! Typed table and view managers over a wide-column store. A
//! [`TableManager`] gives a record type CRUD semantics with optimistic
//! concurrency; a [`ViewManager`] is the read-only counterpart for
//! materialized views and software-maintained projections.
//!
//! ## Write protocol
//!
//! Every write is a self-contained attempt loop:
//!
//! 1. pre-change (or pre-delete) hooks, aborting before any mutation;
//! 2. a conditional statement: insert requires absence, update requires
//!    existence (or the caller's explicit precondition), upsert is
//!    unconditional;
//! 3. execution under one deadline, retrying in place only on the store's
//!    transient write-timeout class;
//! 4. post-change hooks, whose failure surfaces even though the mutation has
//!    already committed.
//!
//! A conditional statement that executes but does not apply yields
//! [`TableError::PreconditionFailed`], distinct from every transport error.

mod core;
pub mod error;
pub mod hooks;
pub mod manager;
pub mod mapping;
pub mod options;
pub mod paging;
mod retry;
pub mod view;

pub use error::{BoxError, TableError};
pub use hooks::{ChangeHook, FnHook, HookStage};
pub use manager::{TableManager, TableManagerConfig};
pub use options::{DeleteOptions, InsertOptions, Precondition, QueryOptions, UpsertOptions, UpdateOptions};
pub use paging::{GreedyScanner, PageFn, PageHandler, ScanFlow, SinglePageScanner};
pub use view::{ViewManager, ViewManagerConfig};

/// Number of concurrent single-item operations permitted by bulk operations
/// when the caller does not override the width.
pub const DEFAULT_BULK_CONCURRENCY: usize = 64;

/// Number of records fetched per page when a scan does not override it.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Deadline applied to each write's attempt loop when the configuration does
/// not override it.
pub const DEFAULT_QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
