//! The typed table manager: reads plus the conditional write engine.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, TryStreamExt};
use manta_cql::{
    Condition, DeleteStatement, InsertStatement, Predicate, Row, SelectStatement, Session,
    Statement, StatementRequest, UpdateStatement, Value,
};
use manta_cql::Consistency;
use manta_metadata::TableSpecification;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;

use crate::core::ReadCore;
use crate::error::TableError;
use crate::hooks::{run_hooks, ChangeHook, HookStage};
use crate::mapping;
use crate::options::{DeleteOptions, InsertOptions, Precondition, QueryOptions, UpsertOptions, UpdateOptions};
use crate::paging::PageHandler;
use crate::retry::execute_with_deadline;
use crate::{DEFAULT_BULK_CONCURRENCY, DEFAULT_QUERY_TIMEOUT};

/// Construction parameters for a [`TableManager`].
#[derive(Clone)]
pub struct TableManagerConfig {
    pub keyspace: String,
    pub spec: TableSpecification,
    pub session: Arc<dyn Session>,
    pub read_consistency: Consistency,
    pub write_consistency: Consistency,
    /// Deadline for each write's whole attempt loop.
    pub query_timeout: Duration,
    /// TTL applied to every insert/update/upsert unless the call overrides it.
    pub default_ttl: Option<Duration>,
    /// Run the schema installer at construction.
    pub install_schema: bool,
}

impl TableManagerConfig {
    pub fn new(
        keyspace: impl Into<String>,
        spec: TableSpecification,
        session: Arc<dyn Session>,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            spec,
            session,
            read_consistency: Consistency::default(),
            write_consistency: Consistency::default(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            default_ttl: None,
            install_schema: false,
        }
    }

    pub fn read_consistency(mut self, consistency: Consistency) -> Self {
        self.read_consistency = consistency;
        self
    }

    pub fn write_consistency(mut self, consistency: Consistency) -> Self {
        self.write_consistency = consistency;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn install_schema(mut self) -> Self {
        self.install_schema = true;
        self
    }
}

/// A typed manager for one base table. Cheap to construct, intended to live
/// for the process lifetime. All state other than hook registration is
/// immutable after construction; register hooks before sharing the manager.
pub struct TableManager<T> {
    core: ReadCore<T>,
    spec: TableSpecification,
    non_key_columns: Vec<String>,
    write_consistency: Consistency,
    default_ttl: Option<Duration>,
    pre_change_hooks: Vec<Arc<dyn ChangeHook<T>>>,
    post_change_hooks: Vec<Arc<dyn ChangeHook<T>>>,
    pre_delete_hooks: Vec<Arc<dyn ChangeHook<T>>>,
}

impl<T> TableManager<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Builds a manager, validating the specification and (optionally)
    /// installing the schema.
    pub async fn new(config: TableManagerConfig) -> Result<Self, TableError> {
        let mut spec = config.spec;
        spec.canonicalize();
        spec.validate()?;

        if config.install_schema {
            manta_ddl::install_table(config.session.as_ref(), &config.keyspace, &spec).await?;
        }

        let core = ReadCore::new(
            config.session,
            spec.qualified_name(&config.keyspace),
            spec.column_names(),
            spec.partition_key_columns(),
            spec.primary_key_columns(),
            config.read_consistency,
            config.query_timeout,
        );

        Ok(Self {
            non_key_columns: spec.non_key_columns(),
            core,
            spec,
            write_consistency: config.write_consistency,
            default_ttl: config.default_ttl,
            pre_change_hooks: Vec::new(),
            post_change_hooks: Vec::new(),
            pre_delete_hooks: Vec::new(),
        })
    }

    /// The validated table specification this manager was built from.
    pub fn spec(&self) -> &TableSpecification {
        &self.spec
    }

    /// The keyspace-qualified table name.
    pub fn qualified_name(&self) -> &str {
        &self.core.table
    }

    // =========================
    // Hook registration
    // =========================

    /// Adds a pre-change hook. These hooks do not fire for deletes.
    pub fn add_pre_change_hook(&mut self, hook: Arc<dyn ChangeHook<T>>) {
        self.pre_change_hooks.push(hook);
    }

    /// Adds a post-change hook. A post-change hook that fails leaves the
    /// table updated; the failure is still returned to the caller. These
    /// hooks do not fire for deletes.
    pub fn add_post_change_hook(&mut self, hook: Arc<dyn ChangeHook<T>>) {
        self.post_change_hooks.push(hook);
    }

    /// Adds a pre-delete hook. Registering one makes every delete fetch the
    /// target row first so the hook can observe the record being removed.
    pub fn add_pre_delete_hook(&mut self, hook: Arc<dyn ChangeHook<T>>) {
        self.pre_delete_hooks.push(hook);
    }

    // =========================
    // Writes
    // =========================

    /// Inserts a record, requiring that it does not already exist.
    pub async fn insert(&self, record: &T, options: &InsertOptions) -> Result<(), TableError> {
        self.insert_internal(record, true, options).await
    }

    /// Inserts a record, replacing any existing row with the same key. This
    /// is the write to use for tables whose columns are all key columns.
    pub async fn insert_or_replace(
        &self,
        record: &T,
        options: &InsertOptions,
    ) -> Result<(), TableError> {
        self.insert_internal(record, false, options).await
    }

    /// Inserts many records concurrently, each through the single-record
    /// path. `concurrency` bounds the in-flight width (0 selects the
    /// default). The first failing record cancels the remaining in-flight
    /// inserts; records that already committed are not rolled back.
    pub async fn insert_bulk(
        &self,
        records: &[T],
        concurrency: usize,
        options: &InsertOptions,
    ) -> Result<(), TableError> {
        let width = if concurrency == 0 { DEFAULT_BULK_CONCURRENCY } else { concurrency };
        stream::iter(records.iter().map(Ok::<&T, TableError>))
            .try_for_each_concurrent(width, |record| self.insert_internal(record, true, options))
            .await
    }

    async fn insert_internal(
        &self,
        record: &T,
        enforce_not_exists: bool,
        options: &InsertOptions,
    ) -> Result<(), TableError> {
        run_hooks(&self.pre_change_hooks, HookStage::PreChange, record).await?;

        let row = mapping::to_row(&self.core.table, record)?;
        let mut statement = InsertStatement::new(&self.core.table);
        for column in &self.core.all_columns {
            statement = statement.value(
                column.clone(),
                row.get(column).cloned().unwrap_or(Value::Null),
            );
        }
        if enforce_not_exists {
            statement = statement.if_not_exists();
        }
        if let Some(ttl) = options.ttl.or(self.default_ttl) {
            statement = statement.ttl(ttl);
        }

        let result = self
            .execute_write(Statement::Insert(statement), "insert")
            .await?;
        if !result.applied {
            return Err(TableError::PreconditionFailed);
        }

        run_hooks(&self.post_change_hooks, HookStage::PostChange, record).await
    }

    /// Updates a record. Without an explicit precondition the update
    /// requires that the row already exists; an explicit precondition
    /// replaces that implicit existence check.
    pub async fn update(&self, record: &T, options: &UpdateOptions) -> Result<(), TableError> {
        options.validate()?;
        run_hooks(&self.pre_change_hooks, HookStage::PreChange, record).await?;

        let statement = self.build_update(record, Some(options), options.ttl)?;
        let result = self
            .execute_write(Statement::Update(statement), "update")
            .await?;
        if !result.applied {
            return Err(TableError::PreconditionFailed);
        }

        run_hooks(&self.post_change_hooks, HookStage::PostChange, record).await
    }

    /// Overwrites or creates a record unconditionally.
    pub async fn upsert(&self, record: &T, options: &UpsertOptions) -> Result<(), TableError> {
        self.upsert_internal(record, options).await
    }

    /// Upserts many records concurrently; same pool semantics as
    /// [`Self::insert_bulk`].
    pub async fn upsert_bulk(
        &self,
        records: &[T],
        concurrency: usize,
        options: &UpsertOptions,
    ) -> Result<(), TableError> {
        let width = if concurrency == 0 { DEFAULT_BULK_CONCURRENCY } else { concurrency };
        stream::iter(records.iter().map(Ok::<&T, TableError>))
            .try_for_each_concurrent(width, |record| self.upsert_internal(record, options))
            .await
    }

    async fn upsert_internal(
        &self,
        record: &T,
        options: &UpsertOptions,
    ) -> Result<(), TableError> {
        run_hooks(&self.pre_change_hooks, HookStage::PreChange, record).await?;

        let ttl = options.ttl.or(self.default_ttl);
        let statement = if self.non_key_columns.is_empty() {
            // A key-only table cannot be written with SET; an unconditional
            // insert is the same operation.
            let row = mapping::to_row(&self.core.table, record)?;
            let mut insert = InsertStatement::new(&self.core.table);
            for column in &self.core.all_columns {
                insert = insert.value(
                    column.clone(),
                    row.get(column).cloned().unwrap_or(Value::Null),
                );
            }
            if let Some(ttl) = ttl {
                insert = insert.ttl(ttl);
            }
            Statement::Insert(insert)
        } else {
            Statement::Update(self.build_update(record, None, ttl)?)
        };

        self.execute_write(statement, "upsert").await?;
        run_hooks(&self.post_change_hooks, HookStage::PostChange, record).await
    }

    fn build_update(
        &self,
        record: &T,
        options: Option<&UpdateOptions>,
        ttl: Option<Duration>,
    ) -> Result<UpdateStatement, TableError> {
        if self.non_key_columns.is_empty() {
            return Err(TableError::Unsupported {
                table: self.core.table.clone(),
                detail: "update requires at least one non-key column; use insert_or_replace".into(),
            });
        }

        let row = mapping::to_row(&self.core.table, record)?;
        let mut statement = UpdateStatement::new(&self.core.table);
        for column in &self.non_key_columns {
            statement = statement.set(
                column.clone(),
                row.get(column).cloned().unwrap_or(Value::Null),
            );
        }
        for column in &self.core.all_key_columns {
            let value = match row.get(column) {
                Some(Value::Null) | None => {
                    return Err(TableError::mapping(
                        &self.core.table,
                        format!("missing value for key column {:?}", column),
                    ))
                }
                Some(value) => value.clone(),
            };
            statement = statement.key(column.clone(), value);
        }

        let condition = match options.and_then(|o| o.precondition.as_ref()) {
            // An explicit precondition already makes this an
            // optimistic-concurrency write; no implicit existence check.
            Some(Precondition::ColumnEquals { column, value }) => Condition::Predicates {
                predicates: vec![Predicate::eq(column.clone())],
                bindings: vec![value.clone()],
            },
            Some(Precondition::Conditional { predicates, bindings }) => Condition::Predicates {
                predicates: predicates.clone(),
                bindings: bindings.clone(),
            },
            None if options.is_some() => Condition::Exists,
            None => Condition::None,
        };
        statement = statement.condition(condition);

        if let Some(ttl) = ttl.or(self.default_ttl) {
            statement = statement.ttl(ttl);
        }
        Ok(statement)
    }

    // =========================
    // Deletes
    // =========================

    /// Removes a record. Only the key fields of `record` need to be set.
    pub async fn delete(&self, record: &T) -> Result<(), TableError> {
        let key = mapping::extract_primary_key(&self.spec, record)?;
        self.delete_by_primary_key(&key).await
    }

    /// Removes a row by primary key. A prefix of the key is accepted and
    /// removes every row underneath it.
    pub async fn delete_by_primary_key(&self, values: &[Value]) -> Result<(), TableError> {
        if values.is_empty() || values.len() > self.core.all_key_columns.len() {
            return Err(TableError::InvalidKey {
                table: self.core.table.clone(),
                expected: self.core.all_key_columns.len(),
                got: values.len(),
            });
        }

        if !self.pre_delete_hooks.is_empty() {
            let query = QueryOptions {
                predicates: self.core.all_key_columns[..values.len()]
                    .iter()
                    .map(Predicate::eq)
                    .collect(),
                bindings: values.to_vec(),
                ..QueryOptions::default()
            };
            if let Some(existing) = self.core.get_using_options(&query).await? {
                run_hooks(&self.pre_delete_hooks, HookStage::PreDelete, &existing).await?;
            }
        }

        let mut statement = DeleteStatement::new(&self.core.table);
        for (column, value) in self.core.all_key_columns[..values.len()]
            .iter()
            .zip(values.iter())
        {
            statement = statement.key(column.clone(), value.clone());
        }

        self.execute_write(Statement::Delete(statement), "delete").await?;
        Ok(())
    }

    /// Removes rows or columns selected by explicit options. A delete whose
    /// options request a condition reports [`TableError::PreconditionFailed`]
    /// when the condition does not hold.
    pub async fn delete_using_options(&self, options: &DeleteOptions) -> Result<(), TableError> {
        options.validate()?;

        if !self.pre_delete_hooks.is_empty() {
            let query = QueryOptions {
                predicates: options.predicates.clone(),
                bindings: options.bindings.clone(),
                ..QueryOptions::default()
            };
            if let Some(existing) = self.core.get_using_options(&query).await? {
                run_hooks(&self.pre_delete_hooks, HookStage::PreDelete, &existing).await?;
            }
        }

        let mut statement = DeleteStatement::new(&self.core.table);
        for column in &options.columns {
            statement = statement.column(column.clone());
        }
        for (predicate, value) in options.predicates.iter().zip(options.bindings.iter()) {
            statement = statement.filter(predicate.clone(), value.clone());
        }

        let conditional = options.if_exists || !options.if_conditions.is_empty();
        if !options.if_conditions.is_empty() {
            statement = statement.condition(Condition::Predicates {
                predicates: options.if_conditions.clone(),
                bindings: options.if_bindings.clone(),
            });
        } else if options.if_exists {
            statement = statement.condition(Condition::Exists);
        }

        let result = self
            .execute_write(Statement::Delete(statement), "delete")
            .await?;
        if conditional && !result.applied {
            log::warn!("conditional delete on {} effected no rows", self.core.table);
            return Err(TableError::PreconditionFailed);
        }
        Ok(())
    }

    async fn execute_write(
        &self,
        statement: Statement,
        operation: &'static str,
    ) -> Result<manta_cql::QueryResult, TableError> {
        let request = StatementRequest::new(statement).consistency(self.write_consistency);
        let deadline = Instant::now() + self.core.query_timeout;
        execute_with_deadline(
            self.core.session.as_ref(),
            &request,
            deadline,
            operation,
            &self.core.table,
        )
        .await
    }

    // =========================
    // Reads (delegated to the shared read core)
    // =========================

    /// Gets the first record from a partition, in clustering order.
    /// Equivalent to [`Self::get_by_primary_key`] when the table has no
    /// clustering key. Absence is `Ok(None)`.
    pub async fn get_by_partition_key(&self, values: &[Value]) -> Result<Option<T>, TableError> {
        self.core.get_by_partition_key(values).await
    }

    /// Gets a record by its full primary key (partitioning plus clustering).
    pub async fn get_by_primary_key(&self, values: &[Value]) -> Result<Option<T>, TableError> {
        self.core.get_by_primary_key(values).await
    }

    /// Untyped point lookup by full primary key.
    pub async fn get_row_by_primary_key(&self, values: &[Value]) -> Result<Option<Row>, TableError> {
        self.core.get_row_by_primary_key(values).await
    }

    /// Gets a record whose key fields match those of `example`.
    pub async fn get_by_example(&self, example: &T) -> Result<Option<T>, TableError> {
        let key = mapping::extract_primary_key(&self.spec, example)?;
        self.core.get_by_primary_key(&key).await
    }

    /// Gets the first record matching an indexed column.
    pub async fn get_by_indexed_column(
        &self,
        column: &str,
        value: Value,
        options: &QueryOptions,
    ) -> Result<Option<T>, TableError> {
        self.core.get_by_indexed_column(column, value, options).await
    }

    /// Gets the first record matching arbitrary options.
    pub async fn get_using_options(&self, options: &QueryOptions) -> Result<Option<T>, TableError> {
        self.core.get_using_options(options).await
    }

    /// Paged scan of the table. See [`PageHandler`] for the stop contract.
    pub async fn scan<H: PageHandler<T>>(
        &self,
        handler: &mut H,
        options: &QueryOptions,
    ) -> Result<(), TableError> {
        self.core.scan(handler, options).await
    }

    /// Paged select of all records in a partition.
    pub async fn select_by_partition_key<H: PageHandler<T>>(
        &self,
        handler: &mut H,
        options: &QueryOptions,
        values: &[Value],
    ) -> Result<(), TableError> {
        self.core.select_by_partition_key(handler, options, values).await
    }

    /// Paged select by primary-key prefix: supplying fewer values than key
    /// columns scans all clustering values under the prefix.
    pub async fn select_by_primary_key<H: PageHandler<T>>(
        &self,
        handler: &mut H,
        options: &QueryOptions,
        values: &[Value],
    ) -> Result<(), TableError> {
        self.core.select_by_primary_key(handler, options, values).await
    }

    /// Paged select of all records matching an indexed column.
    pub async fn select_by_indexed_column<H: PageHandler<T>>(
        &self,
        handler: &mut H,
        column: &str,
        value: Value,
        options: &QueryOptions,
    ) -> Result<(), TableError> {
        self.core
            .select_by_indexed_column(handler, column, value, options)
            .await
    }

    /// Paged select over a caller-supplied statement.
    pub async fn select_by_custom_query<H: PageHandler<T>>(
        &self,
        select: SelectStatement,
        handler: &mut H,
        options: &QueryOptions,
    ) -> Result<(), TableError> {
        self.core.select_by_custom_query(select, handler, options).await
    }

    /// Counts all records in the table.
    pub async fn count(&self) -> Result<i64, TableError> {
        self.core.count().await
    }

    /// Counts the records in one partition.
    pub async fn count_by_partition_key(&self, values: &[Value]) -> Result<i64, TableError> {
        self.core.count_by_partition_key(values).await
    }

    /// Counts the records matched by a caller-supplied statement.
    pub async fn count_by_custom_query(&self, select: SelectStatement) -> Result<i64, TableError> {
        self.core.count_by_custom_query(select).await
    }
}
