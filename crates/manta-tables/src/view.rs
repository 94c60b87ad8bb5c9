//! The read-only view manager.

use std::sync::Arc;
use std::time::Duration;

use manta_cql::{Consistency, Row, SelectStatement, Session, Value};
use manta_metadata::{TableSpecification, ViewSpecification};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::ReadCore;
use crate::error::TableError;
use crate::options::QueryOptions;
use crate::paging::PageHandler;
use crate::DEFAULT_QUERY_TIMEOUT;

/// Construction parameters for a [`ViewManager`].
#[derive(Clone)]
pub struct ViewManagerConfig {
    pub keyspace: String,
    pub spec: ViewSpecification,
    pub session: Arc<dyn Session>,
    pub read_consistency: Consistency,
    pub query_timeout: Duration,
    /// Run the schema installer for the view's backing layout.
    pub install_schema: bool,
}

impl ViewManagerConfig {
    pub fn new(
        keyspace: impl Into<String>,
        spec: ViewSpecification,
        session: Arc<dyn Session>,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            spec,
            session,
            read_consistency: Consistency::default(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            install_schema: false,
        }
    }

    pub fn read_consistency(mut self, consistency: Consistency) -> Self {
        self.read_consistency = consistency;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn install_schema(mut self) -> Self {
        self.install_schema = true;
        self
    }
}

/// A read-only manager over an alternately-keyed layout: a native
/// materialized view, or the read handle of a software-maintained
/// projection. Identical read surface to [`crate::TableManager`], no write
/// path, no hooks.
pub struct ViewManager<T> {
    core: ReadCore<T>,
}

impl<T> ViewManager<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Builds a manager over a native materialized view, validating both the
    /// base table and the view's key layout.
    pub async fn new(config: ViewManagerConfig) -> Result<Self, TableError> {
        config.spec.validate()?;

        if config.install_schema {
            manta_ddl::install_view(config.session.as_ref(), &config.keyspace, &config.spec)
                .await?;
        }

        let columns: Vec<String> = config
            .spec
            .effective_columns()
            .into_iter()
            .map(|c| c.name)
            .collect();

        Ok(Self {
            core: ReadCore::new(
                config.session,
                config.spec.qualified_name(&config.keyspace),
                columns,
                config.spec.partition_key_columns(),
                config.spec.primary_key_columns(),
                config.read_consistency,
                config.query_timeout,
            ),
        })
    }

    /// Builds a read-only handle over a table's own layout. This is the form
    /// a projection manager hands out: the projection is physically a table,
    /// but its consumers only read it.
    pub fn over_table(
        keyspace: &str,
        spec: &TableSpecification,
        session: Arc<dyn Session>,
        read_consistency: Consistency,
        query_timeout: Duration,
    ) -> Result<Self, TableError> {
        spec.validate()?;
        Ok(Self {
            core: ReadCore::new(
                session,
                spec.qualified_name(keyspace),
                spec.column_names(),
                spec.partition_key_columns(),
                spec.primary_key_columns(),
                read_consistency,
                query_timeout,
            ),
        })
    }

    /// The keyspace-qualified name of the underlying layout.
    pub fn qualified_name(&self) -> &str {
        &self.core.table
    }

    /// Gets the first record from a partition, in clustering order.
    pub async fn get_by_partition_key(&self, values: &[Value]) -> Result<Option<T>, TableError> {
        self.core.get_by_partition_key(values).await
    }

    /// Gets a record by the view's full primary key.
    pub async fn get_by_primary_key(&self, values: &[Value]) -> Result<Option<T>, TableError> {
        self.core.get_by_primary_key(values).await
    }

    /// Untyped point lookup by the view's full primary key.
    pub async fn get_row_by_primary_key(&self, values: &[Value]) -> Result<Option<Row>, TableError> {
        self.core.get_row_by_primary_key(values).await
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

    /// Paged scan of the view.
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

    /// Paged select by primary-key prefix.
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

    /// Counts the records in one partition.
    pub async fn count_by_partition_key(&self, values: &[Value]) -> Result<i64, TableError> {
        self.core.count_by_partition_key(values).await
    }

    /// Counts the records matched by a caller-supplied statement.
    pub async fn count_by_custom_query(&self, select: SelectStatement) -> Result<i64, TableError> {
        self.core.count_by_custom_query(select).await
    }
}
