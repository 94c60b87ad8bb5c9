//! Key-layout entries: ordered partitioning and clustering references.

use serde::{Deserialize, Serialize};

/// An ordered reference to a partition-key column. The order field determines
/// the column's position within the composite partition key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitioningColumn {
    /// Name of the referenced column.
    pub column: String,
    /// Position within the composite partition key.
    pub order: i32,
}

impl PartitioningColumn {
    pub fn new(column: impl Into<String>, order: i32) -> Self {
        Self {
            column: column.into(),
            order,
        }
    }
}

/// An ordered reference to a clustering-key column. Order plus the descending
/// flag determine the physical sort order of rows within a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusteringColumn {
    /// Name of the referenced column.
    pub column: String,
    /// Position within the clustering key.
    pub order: i32,
    /// Sort this column descending?
    #[serde(default)]
    pub descending: bool,
}

impl ClusteringColumn {
    pub fn new(column: impl Into<String>, order: i32) -> Self {
        Self {
            column: column.into(),
            order,
            descending: false,
        }
    }

    pub fn descending(column: impl Into<String>, order: i32) -> Self {
        Self {
            column: column.into(),
            order,
            descending: true,
        }
    }
}

/// A by-name partition-key reference used when declaring derived layouts
/// (projections) against an existing table's columns.
pub type PartitioningColumnLookup = PartitioningColumn;

/// A by-name clustering-key reference used when declaring derived layouts
/// (projections) against an existing table's columns.
pub type ClusteringColumnLookup = ClusteringColumn;
