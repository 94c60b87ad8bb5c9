//! The projection manager: control-table bookkeeping plus the fan-out
//! consistency protocol.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use manta_cql::{Consistency, Row, Session, Value};
use manta_metadata::TableSpecification;
use manta_tables::{TableManager, TableManagerConfig, UpsertOptions, ViewManager};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FanOutStage, ProjectionError};
use crate::spec::{build_control_table, build_projection_table, ProjectionSpecification};
use crate::DEFAULT_CONTROL_TABLE_SUFFIX;

/// Construction parameters for a [`ProjectionManager`].
#[derive(Clone)]
pub struct ProjectionManagerConfig {
    pub keyspace: String,
    /// The base table whose rows are being projected.
    pub base_table: TableSpecification,
    pub session: Arc<dyn Session>,
    /// Non-key base columns recorded in the control table. Every non-key
    /// column that appears in any projection's key must be listed here.
    pub tracked_columns: Vec<String>,
    /// The projections to derive and maintain.
    pub projections: Vec<ProjectionSpecification>,
    /// Suffix for the control table's name.
    pub control_table_suffix: String,
    pub read_consistency: Consistency,
    pub write_consistency: Consistency,
    pub query_timeout: Duration,
    /// Install the control and projection tables at construction.
    pub install_schema: bool,
}

impl ProjectionManagerConfig {
    pub fn new(
        keyspace: impl Into<String>,
        base_table: TableSpecification,
        session: Arc<dyn Session>,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            base_table,
            session,
            tracked_columns: Vec::new(),
            projections: Vec::new(),
            control_table_suffix: DEFAULT_CONTROL_TABLE_SUFFIX.to_string(),
            read_consistency: Consistency::default(),
            write_consistency: Consistency::default(),
            query_timeout: manta_tables::DEFAULT_QUERY_TIMEOUT,
            install_schema: false,
        }
    }

    /// Records non-key columns in the control table. Only columns that form
    /// part of a projection's key need tracking.
    pub fn track_columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tracked_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Adds a projection to maintain.
    pub fn projection(mut self, spec: ProjectionSpecification) -> Self {
        self.projections.push(spec);
        self
    }

    pub fn control_table_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.control_table_suffix = suffix.into();
        self
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

    pub fn install_schema(mut self) -> Self {
        self.install_schema = true;
        self
    }
}

/// One maintained projection: its derived layout, the write path, and the
/// read handle exposed to consumers.
struct ManagedProjection<T> {
    spec: TableSpecification,
    leaf: TableManager<T>,
    reader: ViewManager<T>,
}

/// Maintains N alternately-keyed projections of a base table. See the crate
/// docs for the consistency protocol.
pub struct ProjectionManager<T> {
    control: TableManager<T>,
    control_spec: TableSpecification,
    projections: BTreeMap<String, ManagedProjection<T>>,
}

impl<T> std::fmt::Debug for ProjectionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionManager")
            .field("control_spec", &self.control_spec)
            .field("projections", &self.projections.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> ProjectionManager<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Derives the control and projection schemas, validates them, and
    /// builds the underlying table managers.
    pub async fn new(config: ProjectionManagerConfig) -> Result<Self, ProjectionError> {
        config
            .base_table
            .validate()
            .map_err(manta_tables::TableError::Metadata)?;

        for column in &config.tracked_columns {
            match config.base_table.column(column) {
                Some(spec) if !spec.is_key() => {}
                _ => {
                    return Err(ProjectionError::InvalidTrackedColumn {
                        column: column.clone(),
                    })
                }
            }
        }

        let control_spec = build_control_table(
            &config.base_table,
            &config.tracked_columns,
            &config.control_table_suffix,
        );

        let manager_config = |spec: TableSpecification| {
            let mut table_config =
                TableManagerConfig::new(&config.keyspace, spec, config.session.clone())
                    .read_consistency(config.read_consistency)
                    .write_consistency(config.write_consistency)
                    .query_timeout(config.query_timeout);
            if config.install_schema {
                table_config = table_config.install_schema();
            }
            table_config
        };

        let control = TableManager::new(manager_config(control_spec.clone())).await?;

        let mut projections = BTreeMap::new();
        for declaration in &config.projections {
            let spec = build_projection_table(&config.base_table, declaration)?;

            // Cleanup addresses projection rows through the control record,
            // so every non-key column the projection keys on must be
            // tracked.
            for column in spec.primary_key_columns() {
                if control_spec.column(&column).is_none() {
                    return Err(ProjectionError::UntrackedKeyColumn {
                        projection: declaration.name.clone(),
                        column,
                    });
                }
            }

            let leaf = TableManager::new(manager_config(spec.clone())).await?;
            let reader = ViewManager::over_table(
                &config.keyspace,
                &spec,
                config.session.clone(),
                config.read_consistency,
                config.query_timeout,
            )?;

            projections.insert(
                declaration.name.clone(),
                ManagedProjection { spec, leaf, reader },
            );
        }

        Ok(Self {
            control,
            control_spec,
            projections,
        })
    }

    /// The read-only handle for a registered projection, shaped like a view
    /// manager over the projection's key layout.
    pub fn projection(&self, name: &str) -> Option<&ViewManager<T>> {
        self.projections.get(name).map(|p| &p.reader)
    }

    /// Names of the registered projections.
    pub fn projection_names(&self) -> Vec<&str> {
        self.projections.keys().map(String::as_str).collect()
    }

    /// Processes a changed base row: clean up stale projection rows at their
    /// old coordinates, overwrite the control record, then rewrite every
    /// projection.
    pub async fn process_change(&self, updated: &T) -> Result<(), ProjectionError> {
        let natural_key = manta_tables::mapping::extract_primary_key(&self.control_spec, updated)?;

        // Absence means this is the row's first observation.
        let control_row = self
            .control
            .get_row_by_primary_key(&natural_key)
            .await
            .map_err(|source| ProjectionError::Control { source })?;

        if let Some(control_row) = &control_row {
            self.cleanup_projections(control_row).await?;
        }

        self.control
            .upsert(updated, &UpsertOptions::default())
            .await
            .map_err(|source| ProjectionError::Control { source })?;

        let writes = self.projections.iter().map(|(name, projection)| async move {
            projection
                .leaf
                .upsert(updated, &UpsertOptions::default())
                .await
                .map_err(|source| ProjectionError::FanOut {
                    stage: FanOutStage::Write,
                    projection: name.clone(),
                    source,
                })
        });
        try_join_all(writes).await?;

        Ok(())
    }

    /// Processes a deleted base row: remove it from every projection at the
    /// coordinates the control record remembers, then drop the control
    /// record itself.
    pub async fn process_delete(&self, deleted: &T) -> Result<(), ProjectionError> {
        let natural_key = manta_tables::mapping::extract_primary_key(&self.control_spec, deleted)?;

        let control_row = self
            .control
            .get_row_by_primary_key(&natural_key)
            .await
            .map_err(|source| ProjectionError::Control { source })?;

        let Some(control_row) = control_row else {
            // Nothing was ever projected for this identity.
            log::debug!(
                "no control record for delete on {}; skipping fan-out",
                self.control.qualified_name()
            );
            return Ok(());
        };

        self.cleanup_projections(&control_row).await?;

        self.control
            .delete_by_primary_key(&natural_key)
            .await
            .map_err(|source| ProjectionError::Control { source })?;

        Ok(())
    }

    /// Deletes the row described by `control_row` from every projection,
    /// concurrently and fail-fast. Keys are extracted up front so a
    /// malformed control record aborts before any destructive action.
    async fn cleanup_projections(&self, control_row: &Row) -> Result<(), ProjectionError> {
        let mut tasks = Vec::with_capacity(self.projections.len());
        for (name, projection) in &self.projections {
            let key = projection_key_from_control(name, &projection.spec, control_row)?;
            tasks.push(async move {
                projection
                    .leaf
                    .delete_by_primary_key(&key)
                    .await
                    .map_err(|source| ProjectionError::FanOut {
                        stage: FanOutStage::Cleanup,
                        projection: name.clone(),
                        source,
                    })
            });
        }
        try_join_all(tasks).await?;
        Ok(())
    }
}

/// Extracts a projection's ordered key values from a control record.
fn projection_key_from_control(
    projection: &str,
    spec: &TableSpecification,
    control_row: &Row,
) -> Result<Vec<Value>, ProjectionError> {
    spec.primary_key_columns()
        .into_iter()
        .map(|column| match control_row.get(&column) {
            Some(Value::Null) | None => Err(ProjectionError::ControlRecordIncomplete {
                projection: projection.to_string(),
                column,
            }),
            Some(value) => Ok(value.clone()),
        })
        .collect()
}
