//! # manta-ddl
//!
//! Derives and applies the schema-maintenance operations a managed table
//! needs at startup. The sequence is order-sensitive and idempotent:
//!
//! 1. create-if-missing table shell carrying the key columns and key layout;
//! 2. one `ALTER TABLE ... ADD` per non-key column;
//! 3. one create-if-missing index per declared index.
//!
//! Re-running the sequence against an existing table is expected: errors
//! whose message says the object already exists are swallowed (the wire
//! protocol reports duplicate columns as plain error text, so the match is
//! by substring). Any other error is fatal to startup.

use manta_cql::{DdlStatement, Session};
use manta_metadata::{MetadataError, TableSpecification, ViewSpecification};
use thiserror::Error;

/// Errors raised while installing a schema.
#[derive(Debug, Error)]
pub enum DdlError {
    /// The specification failed validation before any statement ran.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// A statement failed for a reason other than the object already
    /// existing.
    #[error("error applying DDL for {target}: {source}")]
    Apply {
        target: String,
        #[source]
        source: manta_cql::SessionError,
    },
}

/// Derives the DDL sequence for a table.
pub fn table_ddl(keyspace: &str, spec: &TableSpecification) -> Vec<DdlStatement> {
    let qualified = spec.qualified_name(keyspace);

    let key_columns: Vec<(String, String)> = spec
        .columns
        .iter()
        .filter(|c| c.is_key())
        .map(|c| (c.name.clone(), c.cql_type.clone()))
        .collect();

    let mut operations = vec![DdlStatement::CreateTable {
        table: qualified.clone(),
        columns: key_columns,
        partition_keys: spec.partition_key_columns(),
        clustering_keys: spec.clustering_key_columns(),
        if_not_exists: true,
    }];

    for column in spec.columns.iter().filter(|c| !c.is_key()) {
        operations.push(DdlStatement::AlterTableAddColumn {
            table: qualified.clone(),
            column: column.name.clone(),
            cql_type: column.cql_type.clone(),
        });
    }

    for (index, column) in &spec.indexes {
        operations.push(DdlStatement::CreateIndex {
            table: qualified.clone(),
            index: index.clone(),
            column: column.clone(),
            if_not_exists: true,
        });
    }

    operations
}

/// Derives the DDL sequence for a view's backing layout: the view's key
/// columns first, then the remaining base columns.
pub fn view_ddl(keyspace: &str, spec: &ViewSpecification) -> Vec<DdlStatement> {
    let qualified = spec.qualified_name(keyspace);
    let keys = spec.primary_key_columns();

    let key_columns: Vec<(String, String)> = spec
        .effective_columns()
        .iter()
        .filter(|c| keys.contains(&c.name))
        .map(|c| (c.name.clone(), c.cql_type.clone()))
        .collect();

    let mut operations = vec![DdlStatement::CreateTable {
        table: qualified.clone(),
        columns: key_columns,
        partition_keys: spec.partition_key_columns(),
        clustering_keys: spec.clustering_key_columns(),
        if_not_exists: true,
    }];

    for column in spec.effective_columns().iter().filter(|c| !keys.contains(&c.name)) {
        operations.push(DdlStatement::AlterTableAddColumn {
            table: qualified.clone(),
            column: column.name.clone(),
            cql_type: column.cql_type.clone(),
        });
    }

    operations
}

/// Validates `spec`, then applies its DDL sequence through `session`.
pub async fn install_table(
    session: &dyn Session,
    keyspace: &str,
    spec: &TableSpecification,
) -> Result<(), DdlError> {
    spec.validate()?;
    apply(session, table_ddl(keyspace, spec)).await
}

/// Validates `spec`, then applies the view's DDL sequence through `session`.
pub async fn install_view(
    session: &dyn Session,
    keyspace: &str,
    spec: &ViewSpecification,
) -> Result<(), DdlError> {
    spec.validate()?;
    apply(session, view_ddl(keyspace, spec)).await
}

async fn apply(session: &dyn Session, operations: Vec<DdlStatement>) -> Result<(), DdlError> {
    for operation in operations {
        match session.execute_ddl(&operation).await {
            Ok(()) => {}
            Err(error) if is_already_exists(&error) => {
                log::debug!(
                    "skipping existing schema object on {}: {}",
                    operation.target(),
                    error
                );
            }
            Err(source) => {
                return Err(DdlError::Apply {
                    target: operation.target().to_string(),
                    source,
                })
            }
        }
    }
    Ok(())
}

fn is_already_exists(error: &manta_cql::SessionError) -> bool {
    error.to_string().to_ascii_lowercase().contains("already exists")
}

#[cfg(test)]
mod tests {
    use super::*;
    use manta_cql::test_utils::MemorySession;
    use manta_metadata::{ClusteringColumn, ColumnSpecification, PartitioningColumn};
    use std::collections::BTreeMap;

    fn orders_spec() -> TableSpecification {
        TableSpecification {
            name: "orders".into(),
            columns: vec![
                ColumnSpecification::partition_key("order_id", "text"),
                ColumnSpecification::clustering_key("line_item", "int"),
                ColumnSpecification::new("region", "text"),
                ColumnSpecification::new("shipping_address", "text"),
            ],
            partitioning: vec![PartitioningColumn::new("order_id", 0)],
            clustering: vec![ClusteringColumn::new("line_item", 0)],
            indexes: BTreeMap::from([("orders_region_idx".to_string(), "region".to_string())]),
        }
    }

    #[test]
    fn test_ddl_sequence_shape() {
        let operations = table_ddl("ks", &orders_spec());
        assert_eq!(operations.len(), 4);
        assert!(matches!(operations[0], DdlStatement::CreateTable { .. }));
        assert!(matches!(operations[1], DdlStatement::AlterTableAddColumn { .. }));
        assert!(matches!(operations[3], DdlStatement::CreateIndex { .. }));
    }

    #[tokio::test]
    async fn test_install_is_idempotent() {
        let session = MemorySession::new();
        install_table(&session, "ks", &orders_spec()).await.unwrap();
        // Second run hits "column already exists" on each ALTER; all swallowed.
        install_table(&session, "ks", &orders_spec()).await.unwrap();
    }

    #[tokio::test]
    async fn test_install_rejects_invalid_spec() {
        let session = MemorySession::new();
        let mut spec = orders_spec();
        spec.partitioning.clear();
        assert!(matches!(
            install_table(&session, "ks", &spec).await,
            Err(DdlError::Metadata(_))
        ));
    }

    #[tokio::test]
    async fn test_install_surfaces_other_errors() {
        let session = MemorySession::new();
        // ALTER against a table that was never created is not an
        // already-exists condition and must be fatal.
        let operations = vec![DdlStatement::AlterTableAddColumn {
            table: "ks.missing".into(),
            column: "region".into(),
            cql_type: "text".into(),
        }];
        assert!(matches!(
            apply(&session, operations).await,
            Err(DdlError::Apply { .. })
        ));
    }
}
