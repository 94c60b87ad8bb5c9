//! # manta-cql
//!
//! The statement and session layer of manta. This crate isolates everything
//! that touches the wire protocol so the higher layers (table managers,
//! projections) stay driver-agnostic.
//!
//! ## Architecture
//!
//! ```text
//! manta-tables / manta-projections (record semantics)
//!     ↓
//! Statement model (structured select/insert/update/delete + CQL rendering)
//!     ↓
//! Session trait (execute, execute_ddl)
//!     ↓
//! Driver adapter / MemorySession (tests)
//! ```
//!
//! Statements are structured values first and CQL text second: a driver
//! adapter renders them with [`Statement::to_cql`], while the in-memory
//! session interprets them directly. Conditional statements report an
//! `applied` flag; a statement that executed but whose condition did not
//! hold is *not* an error at this layer.

pub mod consistency;
pub mod ddl;
pub mod error;
pub mod row;
pub mod session;
pub mod statement;
pub mod test_utils;
pub mod value;

pub use consistency::Consistency;
pub use ddl::DdlStatement;
pub use error::SessionError;
pub use row::Row;
pub use session::{QueryResult, Session, StatementRequest};
pub use statement::{
    Condition, DeleteStatement, InsertStatement, Operator, Predicate, Projection,
    SelectStatement, Statement, UpdateStatement,
};
pub use value::{value_cmp, Value};
