//! Table descriptions: columns, key layout and indexes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::column::ColumnSpecification;
use crate::error::MetadataError;
use crate::is_valid_name;
use crate::keys::{ClusteringColumn, PartitioningColumn};

/// Describes a physical table: its columns, partitioning and clustering
/// layout, and any single-column secondary indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpecification {
    /// Name of the table.
    pub name: String,
    /// All columns, in declaration order.
    pub columns: Vec<ColumnSpecification>,
    /// Partition-key columns, ordered by their `order` field.
    pub partitioning: Vec<PartitioningColumn>,
    /// Clustering-key columns, ordered by their `order` field.
    pub clustering: Vec<ClusteringColumn>,
    /// Secondary indexes: index name -> indexed column name.
    #[serde(default)]
    pub indexes: BTreeMap<String, String>,
}

impl TableSpecification {
    /// Sorts the partitioning and clustering lists into canonical order.
    pub fn canonicalize(&mut self) {
        self.partitioning.sort_by_key(|p| p.order);
        self.clustering.sort_by_key(|c| c.order);
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpecification> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// All column names, in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Names of all non-key columns, in declaration order.
    pub fn non_key_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !c.is_key())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Partition-key column names in canonical order.
    pub fn partition_key_columns(&self) -> Vec<String> {
        let mut ordered = self.partitioning.clone();
        ordered.sort_by_key(|p| p.order);
        ordered.into_iter().map(|p| p.column).collect()
    }

    /// Clustering-key column names in canonical order, with descending flags.
    pub fn clustering_key_columns(&self) -> Vec<(String, bool)> {
        let mut ordered = self.clustering.clone();
        ordered.sort_by_key(|c| c.order);
        ordered.into_iter().map(|c| (c.column, c.descending)).collect()
    }

    /// The full primary key in canonical order: partition columns first, then
    /// clustering columns. This ordering is the argument shape for every
    /// point lookup.
    pub fn primary_key_columns(&self) -> Vec<String> {
        let mut keys = self.partition_key_columns();
        keys.extend(self.clustering_key_columns().into_iter().map(|(name, _)| name));
        keys
    }

    /// The keyspace-qualified table name.
    pub fn qualified_name(&self, keyspace: &str) -> String {
        format!("{}.{}", keyspace, self.name)
    }

    /// Produces a copy retaining only the columns accepted by `keep`.
    /// Partitioning/clustering entries and indexes referencing dropped
    /// columns are removed as well. Used to derive reduced layouts such as a
    /// control table (key columns plus a tracked subset).
    pub fn filtered(&self, keep: impl Fn(&ColumnSpecification) -> bool) -> TableSpecification {
        let columns: Vec<ColumnSpecification> =
            self.columns.iter().filter(|c| keep(c)).cloned().collect();
        let retained = |name: &str| columns.iter().any(|c| c.name == name);

        TableSpecification {
            name: self.name.clone(),
            partitioning: self
                .partitioning
                .iter()
                .filter(|p| retained(&p.column))
                .cloned()
                .collect(),
            clustering: self
                .clustering
                .iter()
                .filter(|c| retained(&c.column))
                .cloned()
                .collect(),
            indexes: self
                .indexes
                .iter()
                .filter(|(_, col)| retained(col))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            columns,
        }
    }

    /// Validates the specification: names, column consistency, key layout
    /// and index references.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if !is_valid_name(&self.name) {
            return Err(MetadataError::InvalidTableOrViewName(self.name.clone()));
        }

        for col in &self.columns {
            col.validate(&self.name)?;
        }

        if self.partitioning.is_empty() {
            return Err(MetadataError::NoPartitioningKey(self.name.clone()));
        }

        for part in &self.partitioning {
            match self.column(&part.column) {
                None => {
                    return Err(MetadataError::MismatchedColumns {
                        table: self.name.clone(),
                        column: part.column.clone(),
                        referrer: "partitioning",
                    })
                }
                Some(col) if !col.is_partitioning_key => {
                    return Err(MetadataError::InconsistentMetadata {
                        table: self.name.clone(),
                        column: col.name.clone(),
                        detail: "listed as partitioning but not flagged as a partitioning key",
                    })
                }
                Some(_) => {}
            }
        }

        for clust in &self.clustering {
            match self.column(&clust.column) {
                None => {
                    return Err(MetadataError::MismatchedColumns {
                        table: self.name.clone(),
                        column: clust.column.clone(),
                        referrer: "clustering",
                    })
                }
                Some(col) if !col.is_clustering_key => {
                    return Err(MetadataError::InconsistentMetadata {
                        table: self.name.clone(),
                        column: col.name.clone(),
                        detail: "listed as clustering but not flagged as a clustering key",
                    })
                }
                Some(_) => {}
            }
        }

        for (index_name, column_name) in &self.indexes {
            if !is_valid_name(index_name) {
                return Err(MetadataError::InvalidColumnName(index_name.clone()));
            }
            if self.column(column_name).is_none() {
                return Err(MetadataError::MismatchedColumns {
                    table: self.name.clone(),
                    column: column_name.clone(),
                    referrer: "index",
                });
            }
        }

        Ok(())
    }
}
