//! Shared fixtures for the table-manager tests.

use std::sync::Arc;

use manta_cql::test_utils::MemorySession;
use manta_metadata::{
    ClusteringColumn, ColumnSpecification, PartitioningColumn, TableSpecification,
};
use manta_tables::{TableManager, TableManagerConfig};
use serde::{Deserialize, Serialize};

pub const TEST_KEYSPACE: &str = "manta_test";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub line_item: i64,
    pub region: String,
    pub shipping_address: String,
}

impl Order {
    pub fn new(order_id: &str, line_item: i64, region: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
            line_item,
            region: region.to_string(),
            shipping_address: format!("Shipping address for {}", order_id),
        }
    }
}

pub fn orders_spec() -> TableSpecification {
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
        indexes: [("orders_region_idx".to_string(), "region".to_string())].into(),
    }
}

pub async fn orders_manager(session: &Arc<MemorySession>) -> TableManager<Order> {
    TableManager::new(
        TableManagerConfig::new(TEST_KEYSPACE, orders_spec(), session.clone()).install_schema(),
    )
    .await
    .expect("manager should start")
}

/// The qualified physical table name the fixture writes to.
pub fn orders_table() -> String {
    format!("{}.orders", TEST_KEYSPACE)
}
