//! Projection declarations and schema derivation.

use serde::{Deserialize, Serialize};

use manta_metadata::{
    ClusteringColumn, ClusteringColumnLookup, ColumnSpecification, PartitioningColumn,
    PartitioningColumnLookup, TableSpecification,
};

use crate::error::ProjectionError;

/// Declares one projection of a base table: a name plus the alternate key
/// layout. The projection may key on any base column (including non-key
/// columns) at the cost of being maintained in software.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionSpecification {
    /// Name of the projection table to create and maintain.
    pub name: String,
    /// Partition keys to use, referenced by base column name.
    pub partitioning: Vec<PartitioningColumnLookup>,
    /// Clustering keys to use, referenced by base column name.
    pub clustering: Vec<ClusteringColumnLookup>,
}

impl ProjectionSpecification {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitioning: Vec::new(),
            clustering: Vec::new(),
        }
    }

    /// Appends the next partition-key column.
    pub fn partition_by(mut self, column: impl Into<String>) -> Self {
        let order = self.partitioning.len() as i32;
        self.partitioning.push(PartitioningColumnLookup::new(column, order));
        self
    }

    /// Appends the next clustering-key column.
    pub fn cluster_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        let order = self.clustering.len() as i32;
        let mut lookup = ClusteringColumnLookup::new(column, order);
        lookup.descending = descending;
        self.clustering.push(lookup);
        self
    }

    /// Sorts the key lookups into canonical order.
    pub fn canonicalize(&mut self) {
        self.partitioning.sort_by_key(|p| p.order);
        self.clustering.sort_by_key(|c| c.order);
    }
}

/// Derives the physical table specification for a projection: every base
/// column copied as a plain column, then the declared subsets re-marked as
/// the projection's own keys in declared order.
///
/// The projection's key set must cover every base-table key column: a base
/// row that cannot be addressed inside the projection could never be moved
/// or removed.
pub(crate) fn build_projection_table(
    base: &TableSpecification,
    declaration: &ProjectionSpecification,
) -> Result<TableSpecification, ProjectionError> {
    let mut declaration = declaration.clone();
    declaration.canonicalize();

    let mut spec = TableSpecification {
        name: declaration.name.clone(),
        columns: base
            .columns
            .iter()
            .map(|c| ColumnSpecification::new(c.name.clone(), c.cql_type.clone()))
            .collect(),
        partitioning: Vec::new(),
        clustering: Vec::new(),
        indexes: Default::default(),
    };

    // Base key columns the projection has not yet accounted for.
    let mut expected: Vec<String> = base.primary_key_columns();

    for (order, lookup) in declaration.partitioning.iter().enumerate() {
        let column = spec
            .columns
            .iter_mut()
            .find(|c| c.name == lookup.column)
            .ok_or_else(|| ProjectionError::UnknownColumn {
                projection: declaration.name.clone(),
                column: lookup.column.clone(),
            })?;
        column.is_partitioning_key = true;
        spec.partitioning
            .push(PartitioningColumn::new(lookup.column.clone(), order as i32));
        expected.retain(|name| name != &lookup.column);
    }

    for (order, lookup) in declaration.clustering.iter().enumerate() {
        let column = spec
            .columns
            .iter_mut()
            .find(|c| c.name == lookup.column)
            .ok_or_else(|| ProjectionError::UnknownColumn {
                projection: declaration.name.clone(),
                column: lookup.column.clone(),
            })?;
        column.is_clustering_key = true;
        spec.clustering.push(ClusteringColumn {
            column: lookup.column.clone(),
            order: order as i32,
            descending: lookup.descending,
        });
        expected.retain(|name| name != &lookup.column);
    }

    if !expected.is_empty() {
        return Err(ProjectionError::MissingKeyColumns {
            projection: declaration.name.clone(),
            columns: expected,
        });
    }

    spec.canonicalize();
    spec.validate()
        .map_err(|e| ProjectionError::Table(manta_tables::TableError::Metadata(e)))?;
    Ok(spec)
}

/// Derives the control-table specification: the base table's key columns
/// plus the tracked non-key columns, renamed with the control suffix.
pub(crate) fn build_control_table(
    base: &TableSpecification,
    tracked: &[String],
    suffix: &str,
) -> TableSpecification {
    let mut spec = base.filtered(|c| c.is_key() || tracked.contains(&c.name));
    spec.name = format!("{}{}", base.name, suffix);
    spec
}
