//! Per-call option values.
//!
//! Options are explicit, immutable values validated before the statement is
//! built. Mutually exclusive combinations are rejected at validation time
//! rather than resolved by application order.

use std::time::Duration;

use manta_cql::{Predicate, Value};

use crate::error::TableError;

/// Options for `insert` / `insert_or_replace` / `insert_bulk`.
#[derive(Debug, Clone, Default)]
pub struct InsertOptions {
    /// Time-to-live applied to the written row.
    pub ttl: Option<Duration>,
}

impl InsertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// An explicit optimistic-concurrency precondition on an update. Supplying
/// one replaces the implicit `IF EXISTS` the engine would otherwise add.
#[derive(Debug, Clone)]
pub enum Precondition {
    /// The named column must currently equal `value`.
    ColumnEquals { column: String, value: Value },
    /// Arbitrary comparators with positionally aligned expected values.
    Conditional {
        predicates: Vec<Predicate>,
        bindings: Vec<Value>,
    },
}

/// Options for `update`.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub ttl: Option<Duration>,
    pub precondition: Option<Precondition>,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Requires the named column to equal `value` at execution time.
    pub fn if_column_equals(mut self, column: impl Into<String>, value: Value) -> Self {
        self.precondition = Some(Precondition::ColumnEquals {
            column: column.into(),
            value,
        });
        self
    }

    /// Requires arbitrary comparators to hold at execution time.
    pub fn if_conditional(
        mut self,
        predicates: Vec<Predicate>,
        bindings: Vec<Value>,
    ) -> Self {
        self.precondition = Some(Precondition::Conditional { predicates, bindings });
        self
    }

    pub(crate) fn validate(&self) -> Result<(), TableError> {
        if let Some(Precondition::Conditional { predicates, bindings }) = &self.precondition {
            if predicates.is_empty() {
                return Err(TableError::InvalidOptions(
                    "conditional precondition requires at least one predicate".into(),
                ));
            }
            if predicates.len() != bindings.len() {
                return Err(TableError::InvalidOptions(format!(
                    "conditional precondition has {} predicates but {} bindings",
                    predicates.len(),
                    bindings.len()
                )));
            }
        }
        Ok(())
    }
}

/// Options for `upsert` / `upsert_bulk`. An upsert never carries a
/// precondition: it overwrites or creates unconditionally.
#[derive(Debug, Clone, Default)]
pub struct UpsertOptions {
    pub ttl: Option<Duration>,
}

impl UpsertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Options for `delete_using_options`: target selection plus an optional
/// condition. `if_exists` and `if_conditions` are mutually exclusive.
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    /// Columns to clear on matched rows; empty removes whole rows.
    pub columns: Vec<String>,
    /// WHERE predicates with positionally aligned `bindings`.
    pub predicates: Vec<Predicate>,
    pub bindings: Vec<Value>,
    /// IF predicates with positionally aligned `if_bindings`.
    pub if_conditions: Vec<Predicate>,
    pub if_bindings: Vec<Value>,
    /// Adds `IF EXISTS`.
    pub if_exists: bool,
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Adds a `column = value` WHERE term.
    pub fn key(mut self, column: impl Into<String>, value: Value) -> Self {
        self.predicates.push(Predicate::eq(column));
        self.bindings.push(value);
        self
    }

    /// Adds an arbitrary WHERE term.
    pub fn filter(mut self, predicate: Predicate, value: Value) -> Self {
        self.predicates.push(predicate);
        self.bindings.push(value);
        self
    }

    /// Adds an IF term.
    pub fn if_condition(mut self, predicate: Predicate, value: Value) -> Self {
        self.if_conditions.push(predicate);
        self.if_bindings.push(value);
        self
    }

    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), TableError> {
        if self.predicates.is_empty() {
            return Err(TableError::InvalidOptions(
                "delete requires at least one predicate".into(),
            ));
        }
        if self.predicates.len() != self.bindings.len() {
            return Err(TableError::InvalidOptions(format!(
                "delete has {} predicates but {} bindings",
                self.predicates.len(),
                self.bindings.len()
            )));
        }
        if self.if_conditions.len() != self.if_bindings.len() {
            return Err(TableError::InvalidOptions(format!(
                "delete has {} IF conditions but {} IF bindings",
                self.if_conditions.len(),
                self.if_bindings.len()
            )));
        }
        if self.if_exists && !self.if_conditions.is_empty() {
            return Err(TableError::InvalidOptions(
                "if_exists and if_conditions are mutually exclusive".into(),
            ));
        }
        Ok(())
    }
}

/// Options for reads and scans.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Rows per page for scans.
    pub page_size: Option<usize>,
    /// Resume token from a prior scan, to continue where it stopped.
    pub resume_token: Option<Vec<u8>>,
    /// Restricts the returned columns; empty selects all declared columns.
    pub columns: Vec<String>,
    /// `(column, descending)` result ordering.
    pub sort: Vec<(String, bool)>,
    /// Extra WHERE predicates with positionally aligned `bindings`.
    pub predicates: Vec<Predicate>,
    pub bindings: Vec<Value>,
    pub limit: Option<usize>,
    pub allow_filtering: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn resume_token(mut self, token: Vec<u8>) -> Self {
        self.resume_token = Some(token);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn sort(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.sort.push((column.into(), descending));
        self
    }

    /// Adds a `column = value` WHERE term.
    pub fn key(mut self, column: impl Into<String>, value: Value) -> Self {
        self.predicates.push(Predicate::eq(column));
        self.bindings.push(value);
        self
    }

    /// Adds an arbitrary WHERE term.
    pub fn filter(mut self, predicate: Predicate, value: Value) -> Self {
        self.predicates.push(predicate);
        self.bindings.push(value);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn allow_filtering(mut self) -> Self {
        self.allow_filtering = true;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), TableError> {
        if self.predicates.len() != self.bindings.len() {
            return Err(TableError::InvalidOptions(format!(
                "query has {} predicates but {} bindings",
                self.predicates.len(),
                self.bindings.len()
            )));
        }
        if let Some(0) = self.page_size {
            return Err(TableError::InvalidOptions("page size must be non-zero".into()));
        }
        Ok(())
    }
}
