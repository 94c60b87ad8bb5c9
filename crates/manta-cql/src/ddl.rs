//! Structured DDL operations.
//!
//! DDL is kept structural for the same reason DML is: a driver renders it to
//! CQL, while the in-memory session interprets it to register table layouts.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// One idempotent schema-maintenance operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DdlStatement {
    /// `CREATE TABLE [IF NOT EXISTS]` with the full key layout. Only key
    /// columns are declared here; non-key columns are added by ALTER so the
    /// sequence stays idempotent for evolving schemas.
    CreateTable {
        /// Keyspace-qualified table name.
        table: String,
        /// `(name, cql_type)` for every column in the shell.
        columns: Vec<(String, String)>,
        /// Partition-key column names, in order.
        partition_keys: Vec<String>,
        /// `(name, descending)` clustering columns, in order.
        clustering_keys: Vec<(String, bool)>,
        if_not_exists: bool,
    },

    /// `ALTER TABLE ... ADD` a single column.
    AlterTableAddColumn {
        table: String,
        column: String,
        cql_type: String,
    },

    /// `CREATE INDEX [IF NOT EXISTS]` over a single column.
    CreateIndex {
        table: String,
        index: String,
        column: String,
        if_not_exists: bool,
    },
}

impl DdlStatement {
    /// The qualified name of the object the statement targets, for error
    /// context.
    pub fn target(&self) -> &str {
        match self {
            DdlStatement::CreateTable { table, .. } => table,
            DdlStatement::AlterTableAddColumn { table, .. } => table,
            DdlStatement::CreateIndex { table, .. } => table,
        }
    }

    /// Renders the operation to CQL text.
    pub fn to_cql(&self) -> String {
        match self {
            DdlStatement::CreateTable {
                table,
                columns,
                partition_keys,
                clustering_keys,
                if_not_exists,
            } => {
                let mut cql = String::from("CREATE TABLE ");
                if *if_not_exists {
                    cql.push_str("IF NOT EXISTS ");
                }
                let _ = write!(cql, "{} (", table);
                for (name, cql_type) in columns {
                    let _ = write!(cql, "{} {}, ", name, cql_type);
                }
                let _ = write!(cql, "PRIMARY KEY (({})", partition_keys.join(","));
                for (name, _) in clustering_keys {
                    let _ = write!(cql, ", {}", name);
                }
                cql.push_str("))");
                if clustering_keys.iter().any(|(_, descending)| *descending) {
                    cql.push_str(" WITH CLUSTERING ORDER BY (");
                    for (i, (name, descending)) in clustering_keys.iter().enumerate() {
                        if i > 0 {
                            cql.push(',');
                        }
                        let _ = write!(cql, "{} {}", name, if *descending { "DESC" } else { "ASC" });
                    }
                    cql.push(')');
                }
                cql
            }
            DdlStatement::AlterTableAddColumn { table, column, cql_type } => {
                format!("ALTER TABLE {} ADD {} {}", table, column, cql_type)
            }
            DdlStatement::CreateIndex { table, index, column, if_not_exists } => {
                let mut cql = String::from("CREATE INDEX ");
                if *if_not_exists {
                    cql.push_str("IF NOT EXISTS ");
                }
                let _ = write!(cql, "{} ON {} ({})", index, table, column);
                cql
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_create_table() {
        let ddl = DdlStatement::CreateTable {
            table: "ks.orders".into(),
            columns: vec![
                ("order_id".into(), "text".into()),
                ("placed_at".into(), "timestamp".into()),
            ],
            partition_keys: vec!["order_id".into()],
            clustering_keys: vec![("placed_at".into(), true)],
            if_not_exists: true,
        };
        assert_eq!(
            ddl.to_cql(),
            "CREATE TABLE IF NOT EXISTS ks.orders (order_id text, placed_at timestamp, \
             PRIMARY KEY ((order_id), placed_at)) WITH CLUSTERING ORDER BY (placed_at DESC)"
        );
    }

    #[test]
    fn test_render_alter_and_index() {
        let alter = DdlStatement::AlterTableAddColumn {
            table: "ks.orders".into(),
            column: "region".into(),
            cql_type: "text".into(),
        };
        assert_eq!(alter.to_cql(), "ALTER TABLE ks.orders ADD region text");

        let index = DdlStatement::CreateIndex {
            table: "ks.orders".into(),
            index: "orders_region_idx".into(),
            column: "region".into(),
            if_not_exists: true,
        };
        assert_eq!(
            index.to_cql(),
            "CREATE INDEX IF NOT EXISTS orders_region_idx ON ks.orders (region)"
        );
    }
}
