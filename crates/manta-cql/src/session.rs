//! The session abstraction: manta's boundary with the wire-protocol driver.

use async_trait::async_trait;

use crate::consistency::Consistency;
use crate::ddl::DdlStatement;
use crate::error::SessionError;
use crate::row::Row;
use crate::statement::Statement;

/// A single execution request: the statement plus per-call execution
/// parameters (consistency, paging).
#[derive(Debug, Clone)]
pub struct StatementRequest {
    pub statement: Statement,
    pub consistency: Consistency,
    /// Rows per page for paged reads. `None` disables paging.
    pub page_size: Option<usize>,
    /// Opaque resume token from a prior page.
    pub paging_state: Option<Vec<u8>>,
}

impl StatementRequest {
    pub fn new(statement: Statement) -> Self {
        Self {
            statement,
            consistency: Consistency::default(),
            page_size: None,
            paging_state: None,
        }
    }

    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn paging_state(mut self, state: Option<Vec<u8>>) -> Self {
        self.paging_state = state;
        self
    }
}

/// The outcome of one executed statement.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Resume token for the next page, when more rows remain.
    pub paging_state: Option<Vec<u8>>,
    /// For conditional statements, whether the condition held and the write
    /// was applied. Unconditional statements report `true`.
    pub applied: bool,
}

impl QueryResult {
    /// The first row, if any.
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}

/// Executes statements against the store.
///
/// Implementations own connection management, paging-token encoding and
/// failure classification. The contract manta relies on:
///
/// - conditional statements return an accurate `applied` flag;
/// - ambiguous replica-acknowledgment failures surface as
///   [`SessionError::WriteTimeout`];
/// - the session is safe to share (`Arc<dyn Session>`) across concurrent
///   calls; per-call state lives in the request.
#[async_trait]
pub trait Session: Send + Sync {
    /// Executes one DML statement.
    async fn execute(&self, request: &StatementRequest) -> Result<QueryResult, SessionError>;

    /// Executes one schema-maintenance operation.
    async fn execute_ddl(&self, ddl: &DdlStatement) -> Result<(), SessionError>;
}
