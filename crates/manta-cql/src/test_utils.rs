//! In-memory [`Session`] implementation for tests.
//!
//! [`MemorySession`] interprets structured statements against process-local
//! state: it registers table layouts from DDL, honours compare-and-set
//! conditions, maintains clustering order, expires TTL'd rows against the
//! tokio clock, and pages results through offset-encoded resume tokens.
//!
//! Fault injection lets tests exercise the write engine's retry loop: queued
//! errors are returned (and consumed) before real execution.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::consistency::Consistency;
use crate::ddl::DdlStatement;
use crate::error::SessionError;
use crate::row::Row;
use crate::session::{QueryResult, Session, StatementRequest};
use crate::statement::{
    Condition, DeleteStatement, InsertStatement, Operator, Predicate, Projection,
    SelectStatement, Statement, UpdateStatement,
};
use crate::value::{value_cmp, values_cmp, Value};

/// Key layout of a registered table.
#[derive(Debug, Clone, Default)]
struct TableLayout {
    columns: Vec<(String, String)>,
    partition_keys: Vec<String>,
    clustering_keys: Vec<(String, bool)>,
    indexes: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct StoredRow {
    values: BTreeMap<String, Value>,
    expires_at: Option<Instant>,
}

impl StoredRow {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now < at).unwrap_or(true)
    }
}

#[derive(Debug, Default)]
struct MemoryTable {
    layout: TableLayout,
    rows: Vec<StoredRow>,
}

impl MemoryTable {
    fn primary_key_of(&self, values: &BTreeMap<String, Value>) -> Vec<Value> {
        self.layout
            .partition_keys
            .iter()
            .chain(self.layout.clustering_keys.iter().map(|(name, _)| name))
            .map(|name| values.get(name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Drops expired rows and returns indices of live rows.
    fn prune_expired(&mut self, now: Instant) {
        self.rows.retain(|row| row.is_live(now));
    }

    /// Sorts rows into physical order: partition key values, then clustering
    /// columns honouring per-column direction.
    fn sort_rows(&mut self) {
        let partition = self.layout.partition_keys.clone();
        let clustering = self.layout.clustering_keys.clone();
        self.rows.sort_by(|a, b| {
            let pa: Vec<Value> = partition
                .iter()
                .map(|c| a.values.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            let pb: Vec<Value> = partition
                .iter()
                .map(|c| b.values.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            let mut ord = values_cmp(&pa, &pb);
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
            for (column, descending) in &clustering {
                let va = a.values.get(column).cloned().unwrap_or(Value::Null);
                let vb = b.values.get(column).cloned().unwrap_or(Value::Null);
                ord = value_cmp(&va, &vb);
                if *descending {
                    ord = ord.reverse();
                }
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });
    }
}

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<String, MemoryTable>,
    faults: VecDeque<SessionError>,
    executed: u64,
}

/// An in-process session holding rows in memory. See the module docs.
#[derive(Default)]
pub struct MemorySession {
    state: Mutex<MemoryState>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an error to be returned by the next `execute` call. Queued
    /// errors are consumed in FIFO order before any real execution.
    pub fn inject_error(&self, error: SessionError) {
        self.state.lock().faults.push_back(error);
    }

    /// Convenience: queues `n` write-timeout errors.
    pub fn inject_write_timeouts(&self, n: usize) {
        for _ in 0..n {
            self.inject_error(SessionError::WriteTimeout {
                consistency: Consistency::LocalQuorum,
                received: 1,
                block_for: 2,
                write_type: "CAS".into(),
            });
        }
    }

    /// Number of DML statements actually executed (fault returns excluded).
    pub fn executed_statements(&self) -> u64 {
        self.state.lock().executed
    }

    /// Number of live rows currently stored for `table`.
    pub fn row_count(&self, table: &str) -> usize {
        let now = Instant::now();
        self.state
            .lock()
            .tables
            .get(table)
            .map(|t| t.rows.iter().filter(|r| r.is_live(now)).count())
            .unwrap_or(0)
    }

    fn matches(
        row: &BTreeMap<String, Value>,
        predicates: &[Predicate],
        bindings: &[Value],
    ) -> Result<bool, SessionError> {
        if predicates.len() != bindings.len() {
            return Err(SessionError::Invalid(format!(
                "predicate/binding mismatch: {} predicates, {} bindings",
                predicates.len(),
                bindings.len()
            )));
        }
        for (predicate, expected) in predicates.iter().zip(bindings.iter()) {
            let actual = row.get(&predicate.column).cloned().unwrap_or(Value::Null);
            let ord = value_cmp(&actual, expected);
            let hit = match predicate.operator {
                Operator::Eq => ord == std::cmp::Ordering::Equal,
                Operator::Lt => ord == std::cmp::Ordering::Less,
                Operator::Le => ord != std::cmp::Ordering::Greater,
                Operator::Gt => ord == std::cmp::Ordering::Greater,
                Operator::Ge => ord != std::cmp::Ordering::Less,
            };
            if !hit {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn execute_select(
        table: &mut MemoryTable,
        select: &SelectStatement,
        page_size: Option<usize>,
        paging_state: Option<&[u8]>,
        now: Instant,
    ) -> Result<QueryResult, SessionError> {
        table.prune_expired(now);
        table.sort_rows();

        let mut matched: Vec<&StoredRow> = Vec::new();
        for row in &table.rows {
            if Self::matches(&row.values, &select.predicates, &select.bindings)? {
                matched.push(row);
            }
        }

        if !select.order_by.is_empty() {
            let order = select.order_by.clone();
            matched.sort_by(|a, b| {
                for (column, descending) in &order {
                    let va = a.values.get(column).cloned().unwrap_or(Value::Null);
                    let vb = b.values.get(column).cloned().unwrap_or(Value::Null);
                    let mut ord = value_cmp(&va, &vb);
                    if *descending {
                        ord = ord.reverse();
                    }
                    if ord != std::cmp::Ordering::Equal {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        if let Some(limit) = select.limit {
            matched.truncate(limit);
        }

        if matches!(select.projection, Projection::Count) {
            let mut row = Row::new();
            row.set("count", Value::from(matched.len() as u64));
            return Ok(QueryResult {
                rows: vec![row],
                paging_state: None,
                applied: true,
            });
        }

        let offset = match paging_state {
            Some(bytes) => {
                let mut buf = [0u8; 8];
                if bytes.len() != 8 {
                    return Err(SessionError::Invalid("malformed paging state".into()));
                }
                buf.copy_from_slice(bytes);
                u64::from_le_bytes(buf) as usize
            }
            None => 0,
        };

        let total = matched.len();
        let end = match page_size {
            Some(size) => (offset + size).min(total),
            None => total,
        };
        let page = &matched[offset.min(total)..end];

        let rows: Vec<Row> = page
            .iter()
            .map(|stored| {
                let values: BTreeMap<String, Value> = match &select.projection {
                    Projection::Columns(cols) => cols
                        .iter()
                        .map(|c| (c.clone(), stored.values.get(c).cloned().unwrap_or(Value::Null)))
                        .collect(),
                    _ => stored.values.clone(),
                };
                Row { values }
            })
            .collect();

        let paging_state = if end < total {
            Some((end as u64).to_le_bytes().to_vec())
        } else {
            None
        };

        Ok(QueryResult {
            rows,
            paging_state,
            applied: true,
        })
    }

    fn execute_insert(
        table: &mut MemoryTable,
        insert: &InsertStatement,
        now: Instant,
    ) -> Result<QueryResult, SessionError> {
        if insert.columns.len() != insert.values.len() {
            return Err(SessionError::Invalid("column/value mismatch on insert".into()));
        }
        table.prune_expired(now);

        let values: BTreeMap<String, Value> = insert
            .columns
            .iter()
            .cloned()
            .zip(insert.values.iter().cloned())
            .collect();
        let key = table.primary_key_of(&values);

        let existing = table
            .rows
            .iter()
            .position(|row| values_cmp(&table.primary_key_of(&row.values), &key).is_eq());

        if insert.if_not_exists {
            if let Some(index) = existing {
                let row = Row {
                    values: table.rows[index].values.clone(),
                };
                return Ok(QueryResult {
                    rows: vec![row],
                    paging_state: None,
                    applied: false,
                });
            }
        }

        let stored = StoredRow {
            values,
            expires_at: insert.ttl.map(|ttl| now + ttl),
        };
        match existing {
            Some(index) => table.rows[index] = stored,
            None => table.rows.push(stored),
        }
        Ok(QueryResult {
            rows: Vec::new(),
            paging_state: None,
            applied: true,
        })
    }

    fn execute_update(
        table: &mut MemoryTable,
        update: &UpdateStatement,
        now: Instant,
    ) -> Result<QueryResult, SessionError> {
        if update.set_columns.len() != update.set_values.len() {
            return Err(SessionError::Invalid("column/value mismatch on update".into()));
        }
        table.prune_expired(now);

        let mut matched: Vec<usize> = Vec::new();
        for (index, row) in table.rows.iter().enumerate() {
            if Self::matches(&row.values, &update.key_predicates, &update.key_bindings)? {
                matched.push(index);
            }
        }

        let applied = match &update.condition {
            Condition::None => true,
            Condition::Exists => !matched.is_empty(),
            Condition::NotExists => matched.is_empty(),
            Condition::Predicates { predicates, bindings } => {
                !matched.is_empty()
                    && matched.iter().all(|&i| {
                        Self::matches(&table.rows[i].values, predicates, bindings)
                            .unwrap_or(false)
                    })
            }
        };

        if !applied {
            let rows = matched
                .first()
                .map(|&i| Row {
                    values: table.rows[i].values.clone(),
                })
                .into_iter()
                .collect();
            return Ok(QueryResult {
                rows,
                paging_state: None,
                applied: false,
            });
        }

        if matched.is_empty() {
            // Unconditional update on an absent row has upsert semantics.
            let mut values: BTreeMap<String, Value> = BTreeMap::new();
            for (predicate, value) in update.key_predicates.iter().zip(update.key_bindings.iter()) {
                values.insert(predicate.column.clone(), value.clone());
            }
            for (column, value) in update.set_columns.iter().zip(update.set_values.iter()) {
                values.insert(column.clone(), value.clone());
            }
            table.rows.push(StoredRow {
                values,
                expires_at: update.ttl.map(|ttl| now + ttl),
            });
        } else {
            for &index in &matched {
                let row = &mut table.rows[index];
                for (column, value) in update.set_columns.iter().zip(update.set_values.iter()) {
                    row.values.insert(column.clone(), value.clone());
                }
                if let Some(ttl) = update.ttl {
                    row.expires_at = Some(now + ttl);
                }
            }
        }

        Ok(QueryResult {
            rows: Vec::new(),
            paging_state: None,
            applied: true,
        })
    }

    fn execute_delete(
        table: &mut MemoryTable,
        delete: &DeleteStatement,
        now: Instant,
    ) -> Result<QueryResult, SessionError> {
        table.prune_expired(now);

        let mut matched: Vec<usize> = Vec::new();
        for (index, row) in table.rows.iter().enumerate() {
            if Self::matches(&row.values, &delete.predicates, &delete.bindings)? {
                matched.push(index);
            }
        }

        let applied = match &delete.condition {
            Condition::None => true,
            Condition::Exists => !matched.is_empty(),
            Condition::NotExists => {
                return Err(SessionError::Invalid("IF NOT EXISTS is not valid on DELETE".into()))
            }
            Condition::Predicates { predicates, bindings } => {
                !matched.is_empty()
                    && matched.iter().all(|&i| {
                        Self::matches(&table.rows[i].values, predicates, bindings)
                            .unwrap_or(false)
                    })
            }
        };

        if !applied {
            return Ok(QueryResult {
                rows: Vec::new(),
                paging_state: None,
                applied: false,
            });
        }

        if delete.columns.is_empty() {
            for index in matched.into_iter().rev() {
                table.rows.remove(index);
            }
        } else {
            for &index in &matched {
                for column in &delete.columns {
                    table.rows[index].values.remove(column);
                }
            }
        }

        Ok(QueryResult {
            rows: Vec::new(),
            paging_state: None,
            applied: true,
        })
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn execute(&self, request: &StatementRequest) -> Result<QueryResult, SessionError> {
        let mut state = self.state.lock();
        if let Some(error) = state.faults.pop_front() {
            return Err(error);
        }
        state.executed += 1;

        let now = Instant::now();
        let name = request.statement.table().to_string();
        let table = state
            .tables
            .get_mut(&name)
            .ok_or_else(|| SessionError::Invalid(format!("unconfigured table {:?}", name)))?;

        match &request.statement {
            Statement::Select(select) => Self::execute_select(
                table,
                select,
                request.page_size,
                request.paging_state.as_deref(),
                now,
            ),
            Statement::Insert(insert) => Self::execute_insert(table, insert, now),
            Statement::Update(update) => Self::execute_update(table, update, now),
            Statement::Delete(delete) => Self::execute_delete(table, delete, now),
        }
    }

    async fn execute_ddl(&self, ddl: &DdlStatement) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        match ddl {
            DdlStatement::CreateTable {
                table,
                columns,
                partition_keys,
                clustering_keys,
                if_not_exists,
            } => {
                if state.tables.contains_key(table) {
                    if *if_not_exists {
                        return Ok(());
                    }
                    return Err(SessionError::Invalid(format!(
                        "table {} already exists",
                        table
                    )));
                }
                state.tables.insert(
                    table.clone(),
                    MemoryTable {
                        layout: TableLayout {
                            columns: columns.clone(),
                            partition_keys: partition_keys.clone(),
                            clustering_keys: clustering_keys.clone(),
                            indexes: BTreeMap::new(),
                        },
                        rows: Vec::new(),
                    },
                );
                Ok(())
            }
            DdlStatement::AlterTableAddColumn { table, column, cql_type } => {
                let entry = state.tables.get_mut(table).ok_or_else(|| {
                    SessionError::Invalid(format!("unconfigured table {:?}", table))
                })?;
                if entry.layout.columns.iter().any(|(name, _)| name == column) {
                    return Err(SessionError::Invalid(format!(
                        "column {} already exists in {}",
                        column, table
                    )));
                }
                entry.layout.columns.push((column.clone(), cql_type.clone()));
                Ok(())
            }
            DdlStatement::CreateIndex { table, index, column, if_not_exists } => {
                let entry = state.tables.get_mut(table).ok_or_else(|| {
                    SessionError::Invalid(format!("unconfigured table {:?}", table))
                })?;
                if entry.layout.indexes.contains_key(index) {
                    if *if_not_exists {
                        return Ok(());
                    }
                    return Err(SessionError::Invalid(format!(
                        "index {} already exists on {}",
                        index, table
                    )));
                }
                entry.layout.indexes.insert(index.clone(), column.clone());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn orders_ddl() -> DdlStatement {
        DdlStatement::CreateTable {
            table: "ks.orders".into(),
            columns: vec![
                ("order_id".into(), "text".into()),
                ("line_item".into(), "int".into()),
                ("region".into(), "text".into()),
            ],
            partition_keys: vec!["order_id".into()],
            clustering_keys: vec![("line_item".into(), false)],
            if_not_exists: true,
        }
    }

    async fn session_with_orders() -> MemorySession {
        let session = MemorySession::new();
        session.execute_ddl(&orders_ddl()).await.unwrap();
        session
    }

    fn insert(order: &str, item: i64, region: &str) -> StatementRequest {
        StatementRequest::new(Statement::Insert(
            InsertStatement::new("ks.orders")
                .value("order_id", json!(order))
                .value("line_item", json!(item))
                .value("region", json!(region))
                .if_not_exists(),
        ))
    }

    #[tokio::test]
    async fn test_insert_if_not_exists() {
        let session = session_with_orders().await;
        let first = session.execute(&insert("o-1", 1, "APAC")).await.unwrap();
        assert!(first.applied);

        let second = session.execute(&insert("o-1", 1, "EMEA")).await.unwrap();
        assert!(!second.applied);
        assert_eq!(second.first().unwrap().as_str("region"), Some("APAC"));
        assert_eq!(session.row_count("ks.orders"), 1);
    }

    #[tokio::test]
    async fn test_select_clustering_order() {
        let session = session_with_orders().await;
        for item in [3, 1, 2] {
            session.execute(&insert("o-1", item, "APAC")).await.unwrap();
        }

        let result = session
            .execute(&StatementRequest::new(Statement::Select(
                SelectStatement::new("ks.orders").filter(Predicate::eq("order_id"), json!("o-1")),
            )))
            .await
            .unwrap();
        let items: Vec<i64> = result.rows.iter().filter_map(|r| r.as_i64("line_item")).collect();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_update_conditions() {
        let session = session_with_orders().await;
        session.execute(&insert("o-1", 1, "APAC")).await.unwrap();

        let miss = StatementRequest::new(Statement::Update(
            UpdateStatement::new("ks.orders")
                .set("region", json!("EMEA"))
                .key("order_id", json!("o-9"))
                .key("line_item", json!(1))
                .condition(Condition::Exists),
        ));
        assert!(!session.execute(&miss).await.unwrap().applied);

        let cas = StatementRequest::new(Statement::Update(
            UpdateStatement::new("ks.orders")
                .set("region", json!("EMEA"))
                .key("order_id", json!("o-1"))
                .key("line_item", json!(1))
                .condition(Condition::Predicates {
                    predicates: vec![Predicate::eq("region")],
                    bindings: vec![json!("APAC")],
                }),
        ));
        assert!(session.execute(&cas).await.unwrap().applied);

        // The same comparison no longer holds.
        assert!(!session.execute(&cas).await.unwrap().applied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let session = session_with_orders().await;
        let request = StatementRequest::new(Statement::Insert(
            InsertStatement::new("ks.orders")
                .value("order_id", json!("o-1"))
                .value("line_item", json!(1))
                .value("region", json!("APAC"))
                .ttl(Duration::from_secs(5)),
        ));
        session.execute(&request).await.unwrap();
        assert_eq!(session.row_count("ks.orders"), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(session.row_count("ks.orders"), 0);
    }

    #[tokio::test]
    async fn test_paging() {
        let session = session_with_orders().await;
        for item in 0..10 {
            session.execute(&insert("o-1", item, "APAC")).await.unwrap();
        }

        let mut token: Option<Vec<u8>> = None;
        let mut pages = 0;
        let mut seen = 0;
        loop {
            let request = StatementRequest::new(Statement::Select(
                SelectStatement::new("ks.orders").filter(Predicate::eq("order_id"), json!("o-1")),
            ))
            .page_size(4)
            .paging_state(token.clone());
            let result = session.execute(&request).await.unwrap();
            if result.rows.is_empty() {
                break;
            }
            pages += 1;
            seen += result.rows.len();
            token = result.paging_state;
            if token.is_none() {
                break;
            }
        }
        assert_eq!(pages, 3);
        assert_eq!(seen, 10);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let session = session_with_orders().await;
        session.inject_write_timeouts(1);

        let error = session.execute(&insert("o-1", 1, "APAC")).await.unwrap_err();
        assert!(error.is_write_timeout());

        // The fault is consumed; the next call executes for real.
        assert!(session.execute(&insert("o-1", 1, "APAC")).await.unwrap().applied);
        assert_eq!(session.executed_statements(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ddl() {
        let session = session_with_orders().await;
        assert!(session.execute_ddl(&orders_ddl()).await.is_ok());

        let alter = DdlStatement::AlterTableAddColumn {
            table: "ks.orders".into(),
            column: "region".into(),
            cql_type: "text".into(),
        };
        let error = session.execute_ddl(&alter).await.unwrap_err();
        assert!(error.to_string().contains("already exists"));
    }
}
