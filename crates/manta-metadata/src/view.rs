//! View descriptions: an alternate key layout over a base table.

use serde::{Deserialize, Serialize};

use crate::column::ColumnSpecification;
use crate::error::MetadataError;
use crate::is_valid_name;
use crate::keys::{ClusteringColumn, PartitioningColumn};
use crate::table::TableSpecification;

/// Describes a native materialized view of a base table. The store restricts
/// view keys to the base table's key columns plus at most one extra column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSpecification {
    /// Name of the view.
    pub name: String,
    /// The table this is a view of.
    pub table: TableSpecification,
    /// The view's partition-key columns.
    pub partitioning: Vec<PartitioningColumn>,
    /// The view's clustering-key columns.
    pub clustering: Vec<ClusteringColumn>,
}

impl ViewSpecification {
    /// The view's partition-key column names in canonical order.
    pub fn partition_key_columns(&self) -> Vec<String> {
        let mut ordered = self.partitioning.clone();
        ordered.sort_by_key(|p| p.order);
        ordered.into_iter().map(|p| p.column).collect()
    }

    /// The view's clustering-key column names in canonical order.
    pub fn clustering_key_columns(&self) -> Vec<(String, bool)> {
        let mut ordered = self.clustering.clone();
        ordered.sort_by_key(|c| c.order);
        ordered.into_iter().map(|c| (c.column, c.descending)).collect()
    }

    /// The view's full key in canonical order.
    pub fn primary_key_columns(&self) -> Vec<String> {
        let mut keys = self.partition_key_columns();
        keys.extend(self.clustering_key_columns().into_iter().map(|(name, _)| name));
        keys
    }

    /// The view's column order: key columns first, then the remaining base
    /// columns in their declaration order.
    pub fn effective_columns(&self) -> Vec<ColumnSpecification> {
        let keys = self.primary_key_columns();
        let mut columns: Vec<ColumnSpecification> = Vec::with_capacity(self.table.columns.len());
        for key in &keys {
            if let Some(col) = self.table.column(key) {
                columns.push(col.clone());
            }
        }
        for col in &self.table.columns {
            if !keys.contains(&col.name) {
                columns.push(col.clone());
            }
        }
        columns
    }

    /// The keyspace-qualified view name.
    pub fn qualified_name(&self, keyspace: &str) -> String {
        format!("{}.{}", keyspace, self.name)
    }

    /// Validates the view: the base table must be valid, every base key
    /// column must appear in the view keys, and the view may add at most one
    /// column beyond the base key set.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if !is_valid_name(&self.name) {
            return Err(MetadataError::InvalidTableOrViewName(self.name.clone()));
        }
        self.table.validate()?;

        let table_keys = self.table.primary_key_columns();
        let view_keys = self.primary_key_columns();

        if view_keys.len() < table_keys.len() {
            return Err(MetadataError::ViewKeyUnsuitable {
                view: self.name.clone(),
                detail: format!(
                    "have {} key columns but the base table has {}",
                    view_keys.len(),
                    table_keys.len()
                ),
            });
        }

        for key in &table_keys {
            if !view_keys.contains(key) {
                return Err(MetadataError::ViewKeyUnsuitable {
                    view: self.name.clone(),
                    detail: format!("missing base key column {:?}", key),
                });
            }
        }

        let residual: Vec<&String> =
            view_keys.iter().filter(|k| !table_keys.contains(k)).collect();
        if residual.len() > 1 {
            return Err(MetadataError::ViewKeyUnsuitable {
                view: self.name.clone(),
                detail: format!("too many residual key columns: {:?}", residual),
            });
        }

        for key in &view_keys {
            if self.table.column(key).is_none() {
                return Err(MetadataError::MismatchedColumns {
                    table: self.name.clone(),
                    column: key.clone(),
                    referrer: "view key",
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn base_spec() -> TableSpecification {
        TableSpecification {
            name: "orders".into(),
            columns: vec![
                ColumnSpecification::partition_key("order_id", "text"),
                ColumnSpecification::new("region", "text"),
                ColumnSpecification::new("shipping_address", "text"),
            ],
            partitioning: vec![PartitioningColumn::new("order_id", 0)],
            clustering: vec![],
            indexes: BTreeMap::new(),
        }
    }

    fn view_over(partitioning: Vec<PartitioningColumn>, clustering: Vec<ClusteringColumn>) -> ViewSpecification {
        ViewSpecification {
            name: "orders_by_region".into(),
            table: base_spec(),
            partitioning,
            clustering,
        }
    }

    #[test]
    fn test_single_extra_key_is_accepted() {
        let view = view_over(
            vec![PartitioningColumn::new("region", 0)],
            vec![ClusteringColumn::new("order_id", 0)],
        );
        assert!(view.validate().is_ok());
        assert_eq!(view.primary_key_columns(), vec!["region", "order_id"]);
    }

    #[test]
    fn test_missing_base_key_is_rejected() {
        let view = view_over(vec![PartitioningColumn::new("region", 0)], vec![]);
        assert!(matches!(view.validate(), Err(MetadataError::ViewKeyUnsuitable { .. })));
    }

    #[test]
    fn test_two_extra_keys_are_rejected() {
        let view = view_over(
            vec![PartitioningColumn::new("region", 0)],
            vec![
                ClusteringColumn::new("shipping_address", 0),
                ClusteringColumn::new("order_id", 1),
            ],
        );
        assert!(matches!(view.validate(), Err(MetadataError::ViewKeyUnsuitable { .. })));
    }

    #[test]
    fn test_effective_columns_put_keys_first() {
        let view = view_over(
            vec![PartitioningColumn::new("region", 0)],
            vec![ClusteringColumn::new("order_id", 0)],
        );
        let names: Vec<String> = view.effective_columns().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["region", "order_id", "shipping_address"]);
    }
}
