//! The read/scan engine shared by table and view managers.
//!
//! A [`ReadCore`] holds the immutable per-object state (session handle, key
//! layout, consistency, timeout) and implements every read operation once;
//! [`crate::TableManager`] and [`crate::ViewManager`] delegate to it.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use manta_cql::{
    Consistency, Predicate, Row, SelectStatement, Session, Statement, StatementRequest, Value,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::TableError;
use crate::mapping;
use crate::options::QueryOptions;
use crate::paging::{PageHandler, ScanFlow};
use crate::DEFAULT_PAGE_SIZE;

/// Immutable read-side state for one table, view or projection.
pub struct ReadCore<T> {
    pub(crate) session: Arc<dyn Session>,
    /// Keyspace-qualified name used in statements.
    pub(crate) table: String,
    pub(crate) all_columns: Vec<String>,
    pub(crate) partition_key_columns: Vec<String>,
    /// Partition columns first, then clustering columns, canonical order.
    pub(crate) all_key_columns: Vec<String>,
    pub(crate) read_consistency: Consistency,
    pub(crate) query_timeout: Duration,
    _record: PhantomData<fn() -> T>,
}

impl<T> ReadCore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        session: Arc<dyn Session>,
        table: String,
        all_columns: Vec<String>,
        partition_key_columns: Vec<String>,
        all_key_columns: Vec<String>,
        read_consistency: Consistency,
        query_timeout: Duration,
    ) -> Self {
        Self {
            session,
            table,
            all_columns,
            partition_key_columns,
            all_key_columns,
            read_consistency,
            query_timeout,
            _record: PhantomData,
        }
    }

    /// A SELECT over all declared columns.
    pub(crate) fn select_all(&self) -> SelectStatement {
        SelectStatement::new(&self.table).columns(self.all_columns.iter().cloned())
    }

    /// Applies query options to a select: projection, extra predicates,
    /// ordering, limit, filtering.
    pub(crate) fn apply_options(
        &self,
        mut select: SelectStatement,
        options: &QueryOptions,
    ) -> SelectStatement {
        if !options.columns.is_empty() {
            select = select.columns(options.columns.iter().cloned());
        }
        select = select.filter_all(
            options.predicates.iter().cloned(),
            options.bindings.iter().cloned(),
        );
        for (column, descending) in &options.sort {
            select = select.order_by(column.clone(), *descending);
        }
        if let Some(limit) = options.limit {
            select = select.limit(limit);
        }
        if options.allow_filtering {
            select = select.allow_filtering();
        }
        select
    }

    fn key_select(&self, columns: &[String], values: &[Value]) -> SelectStatement {
        self.select_all().filter_all(
            columns.iter().map(Predicate::eq),
            values.iter().cloned(),
        )
    }

    async fn fetch_first(
        &self,
        select: SelectStatement,
        operation: &'static str,
    ) -> Result<Option<Row>, TableError> {
        let request =
            StatementRequest::new(Statement::Select(select)).consistency(self.read_consistency);
        let result = self.session.execute(&request).await.map_err(|source| {
            TableError::Session {
                operation,
                table: self.table.clone(),
                source,
            }
        })?;
        Ok(result.rows.into_iter().next())
    }

    fn decode(&self, row: &Row) -> Result<T, TableError> {
        mapping::from_row(&self.table, row)
    }

    /// Gets the first record from a partition, in clustering order. Absence
    /// is `Ok(None)`, never an error.
    pub(crate) async fn get_by_partition_key(
        &self,
        values: &[Value],
    ) -> Result<Option<T>, TableError> {
        if values.len() != self.partition_key_columns.len() {
            return Err(TableError::InvalidKey {
                table: self.table.clone(),
                expected: self.partition_key_columns.len(),
                got: values.len(),
            });
        }
        let select = self
            .key_select(&self.partition_key_columns, values)
            .limit(1);
        match self.fetch_first(select, "get_by_partition_key").await? {
            Some(row) => Ok(Some(self.decode(&row)?)),
            None => Ok(None),
        }
    }

    /// Gets a record by its full primary key.
    pub(crate) async fn get_by_primary_key(
        &self,
        values: &[Value],
    ) -> Result<Option<T>, TableError> {
        Ok(self
            .get_row_by_primary_key(values)
            .await?
            .map(|row| self.decode(&row))
            .transpose()?)
    }

    /// The untyped variant of [`Self::get_by_primary_key`], used by layered
    /// tooling that addresses rows without a full record type.
    pub(crate) async fn get_row_by_primary_key(
        &self,
        values: &[Value],
    ) -> Result<Option<Row>, TableError> {
        if values.len() != self.all_key_columns.len() {
            return Err(TableError::InvalidKey {
                table: self.table.clone(),
                expected: self.all_key_columns.len(),
                got: values.len(),
            });
        }
        let select = self.key_select(&self.all_key_columns, values).limit(1);
        self.fetch_first(select, "get_by_primary_key").await
    }

    /// Gets the first record matching an indexed column.
    pub(crate) async fn get_by_indexed_column(
        &self,
        column: &str,
        value: Value,
        options: &QueryOptions,
    ) -> Result<Option<T>, TableError> {
        options.validate()?;
        let select = self
            .apply_options(self.select_all(), options)
            .filter(Predicate::eq(column), value)
            .limit(1);
        match self.fetch_first(select, "get_by_indexed_column").await? {
            Some(row) => Ok(Some(self.decode(&row)?)),
            None => Ok(None),
        }
    }

    /// Gets the first record matching arbitrary options (predicates,
    /// bindings, projection).
    pub(crate) async fn get_using_options(
        &self,
        options: &QueryOptions,
    ) -> Result<Option<T>, TableError> {
        options.validate()?;
        let select = self.apply_options(self.select_all(), options).limit(1);
        match self.fetch_first(select, "get_using_options").await? {
            Some(row) => Ok(Some(self.decode(&row)?)),
            None => Ok(None),
        }
    }

    /// Runs the shared paged-scan loop over `select`.
    ///
    /// Each page is handed to `handler` together with the resume token that
    /// produced it and the token for the next page. The scan stops when the
    /// handler says stop, the store reports no further token, or a page
    /// comes back empty.
    pub(crate) async fn page_query<H: PageHandler<T>>(
        &self,
        select: SelectStatement,
        handler: &mut H,
        options: &QueryOptions,
    ) -> Result<(), TableError> {
        options.validate()?;
        let page_size = options.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let mut state: Option<Vec<u8>> = options.resume_token.clone();

        loop {
            let request = StatementRequest::new(Statement::Select(select.clone()))
                .consistency(self.read_consistency)
                .page_size(page_size)
                .paging_state(state.clone());

            let result = self.session.execute(&request).await.map_err(|source| {
                TableError::Session {
                    operation: "scan",
                    table: self.table.clone(),
                    source,
                }
            })?;

            if result.rows.is_empty() {
                break;
            }

            let records: Vec<T> = result
                .rows
                .iter()
                .map(|row| self.decode(row))
                .collect::<Result<_, _>>()?;

            let next = result.paging_state;
            let flow = handler
                .on_page(records, state.as_deref(), next.as_deref())
                .await?;

            if flow == ScanFlow::Stop || next.is_none() {
                break;
            }
            state = next;
        }

        Ok(())
    }

    /// Paged scan of the whole object.
    pub(crate) async fn scan<H: PageHandler<T>>(
        &self,
        handler: &mut H,
        options: &QueryOptions,
    ) -> Result<(), TableError> {
        let select = self.apply_options(self.select_all(), options);
        self.page_query(select, handler, options).await
    }

    /// Paged select of all records in a partition.
    pub(crate) async fn select_by_partition_key<H: PageHandler<T>>(
        &self,
        handler: &mut H,
        options: &QueryOptions,
        values: &[Value],
    ) -> Result<(), TableError> {
        if values.len() != self.partition_key_columns.len() {
            return Err(TableError::InvalidKey {
                table: self.table.clone(),
                expected: self.partition_key_columns.len(),
                got: values.len(),
            });
        }
        let select = self.apply_options(
            self.key_select(&self.partition_key_columns, values),
            options,
        );
        self.page_query(select, handler, options).await
    }

    /// Paged select by a primary-key prefix. Supplying fewer values than
    /// there are key columns applies only that prefix of key predicates,
    /// scanning every clustering value underneath it.
    pub(crate) async fn select_by_primary_key<H: PageHandler<T>>(
        &self,
        handler: &mut H,
        options: &QueryOptions,
        values: &[Value],
    ) -> Result<(), TableError> {
        if values.is_empty() || values.len() > self.all_key_columns.len() {
            return Err(TableError::InvalidKey {
                table: self.table.clone(),
                expected: self.all_key_columns.len(),
                got: values.len(),
            });
        }
        let prefix = &self.all_key_columns[..values.len()];
        let select = self.apply_options(self.key_select(prefix, values), options);
        self.page_query(select, handler, options).await
    }

    /// Paged select of all records matching an indexed column.
    pub(crate) async fn select_by_indexed_column<H: PageHandler<T>>(
        &self,
        handler: &mut H,
        column: &str,
        value: Value,
        options: &QueryOptions,
    ) -> Result<(), TableError> {
        let select = self
            .apply_options(self.select_all(), options)
            .filter(Predicate::eq(column), value);
        self.page_query(select, handler, options).await
    }

    /// Paged select over a caller-supplied statement.
    pub(crate) async fn select_by_custom_query<H: PageHandler<T>>(
        &self,
        select: SelectStatement,
        handler: &mut H,
        options: &QueryOptions,
    ) -> Result<(), TableError> {
        self.page_query(select, handler, options).await
    }

    async fn count_with(&self, select: SelectStatement) -> Result<i64, TableError> {
        let request =
            StatementRequest::new(Statement::Select(select)).consistency(self.read_consistency);
        let result = self.session.execute(&request).await.map_err(|source| {
            TableError::Session {
                operation: "count",
                table: self.table.clone(),
                source,
            }
        })?;
        result
            .first()
            .and_then(|row| row.as_i64("count"))
            .ok_or_else(|| TableError::mapping(&self.table, "count query returned no count column"))
    }

    /// Counts all records.
    pub(crate) async fn count(&self) -> Result<i64, TableError> {
        self.count_with(SelectStatement::new(&self.table).count()).await
    }

    /// Counts the records in one partition.
    pub(crate) async fn count_by_partition_key(
        &self,
        values: &[Value],
    ) -> Result<i64, TableError> {
        if values.len() != self.partition_key_columns.len() {
            return Err(TableError::InvalidKey {
                table: self.table.clone(),
                expected: self.partition_key_columns.len(),
                got: values.len(),
            });
        }
        let select = SelectStatement::new(&self.table).count().filter_all(
            self.partition_key_columns.iter().map(Predicate::eq),
            values.iter().cloned(),
        );
        self.count_with(select).await
    }

    /// Counts the records matched by a caller-supplied statement. The
    /// statement's projection is forced to a count.
    pub(crate) async fn count_by_custom_query(
        &self,
        select: SelectStatement,
    ) -> Result<i64, TableError> {
        self.count_with(select.count()).await
    }
}
