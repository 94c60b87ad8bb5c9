//! Column descriptions.

use serde::{Deserialize, Serialize};

use crate::error::MetadataError;
use crate::is_valid_name;

/// Describes a single column of a table or view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpecification {
    /// Name of the column.
    pub name: String,
    /// The CQL type string for this column (e.g. `text`, `bigint`).
    pub cql_type: String,
    /// Part of the composite partition key?
    #[serde(default)]
    pub is_partitioning_key: bool,
    /// Part of the clustering key?
    #[serde(default)]
    pub is_clustering_key: bool,
}

impl ColumnSpecification {
    /// A plain (non-key) column.
    pub fn new(name: impl Into<String>, cql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cql_type: cql_type.into(),
            is_partitioning_key: false,
            is_clustering_key: false,
        }
    }

    /// A partition-key column.
    pub fn partition_key(name: impl Into<String>, cql_type: impl Into<String>) -> Self {
        Self {
            is_partitioning_key: true,
            ..Self::new(name, cql_type)
        }
    }

    /// A clustering-key column.
    pub fn clustering_key(name: impl Into<String>, cql_type: impl Into<String>) -> Self {
        Self {
            is_clustering_key: true,
            ..Self::new(name, cql_type)
        }
    }

    /// True when the column participates in the primary key.
    pub fn is_key(&self) -> bool {
        self.is_partitioning_key || self.is_clustering_key
    }

    /// Validates the column in isolation. The owning table's name is only
    /// used for error context.
    pub fn validate(&self, table: &str) -> Result<(), MetadataError> {
        if !is_valid_name(&self.name) {
            return Err(MetadataError::InvalidColumnName(self.name.clone()));
        }
        if self.cql_type.trim().is_empty() {
            return Err(MetadataError::InconsistentMetadata {
                table: table.to_string(),
                column: self.name.clone(),
                detail: "missing CQL type",
            });
        }
        if self.is_partitioning_key && self.is_clustering_key {
            return Err(MetadataError::InconsistentMetadata {
                table: table.to_string(),
                column: self.name.clone(),
                detail: "column cannot be both a partitioning and a clustering key",
            });
        }
        Ok(())
    }
}
