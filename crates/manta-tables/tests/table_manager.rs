//! Write-path behaviour: conditional semantics, retry, bulk concurrency.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{orders_manager, orders_table, Order};
use manta_cql::test_utils::MemorySession;
use manta_cql::{DdlStatement, QueryResult, SessionError, StatementRequest};
use manta_tables::{
    DeleteOptions, InsertOptions, TableError, TableManager, TableManagerConfig, UpsertOptions,
    UpdateOptions,
};
use serde_json::json;

#[tokio::test]
async fn test_insert_round_trip() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    let order = Order::new("rt-1", 1, "APAC");
    manager.insert(&order, &InsertOptions::default()).await.unwrap();

    let fetched = manager
        .get_by_partition_key(&[json!("rt-1")])
        .await
        .unwrap()
        .expect("row should exist");
    assert_eq!(fetched, order);
}

#[tokio::test]
async fn test_insert_enforces_uniqueness() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    let first = Order::new("uniq-1", 1, "APAC");
    manager.insert(&first, &InsertOptions::default()).await.unwrap();

    let second = Order::new("uniq-1", 1, "EMEA");
    let error = manager.insert(&second, &InsertOptions::default()).await.unwrap_err();
    assert!(matches!(error, TableError::PreconditionFailed));

    // The stored row reflects the first insert only.
    let fetched = manager
        .get_by_primary_key(&[json!("uniq-1"), json!(1)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.region, "APAC");
}

#[tokio::test]
async fn test_insert_or_replace_overwrites() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    manager
        .insert(&Order::new("rep-1", 1, "APAC"), &InsertOptions::default())
        .await
        .unwrap();
    manager
        .insert_or_replace(&Order::new("rep-1", 1, "EMEA"), &InsertOptions::default())
        .await
        .unwrap();

    let fetched = manager
        .get_by_primary_key(&[json!("rep-1"), json!(1)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.region, "EMEA");
}

#[tokio::test]
async fn test_update_requires_existence() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    let ghost = Order::new("upd-none", 1, "APAC");
    let error = manager.update(&ghost, &UpdateOptions::default()).await.unwrap_err();
    assert!(matches!(error, TableError::PreconditionFailed));

    manager.insert(&ghost, &InsertOptions::default()).await.unwrap();
    let mut changed = ghost.clone();
    changed.region = "EMEA".into();
    manager.update(&changed, &UpdateOptions::default()).await.unwrap();

    let fetched = manager
        .get_by_primary_key(&[json!("upd-none"), json!(1)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.region, "EMEA");
}

#[tokio::test]
async fn test_update_with_explicit_precondition() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    let order = Order::new("cas-1", 1, "APAC");
    manager.insert(&order, &InsertOptions::default()).await.unwrap();

    let mut changed = order.clone();
    changed.region = "EMEA".into();

    // Wrong expected value: the compare-and-set must not apply.
    let stale = UpdateOptions::new().if_column_equals("region", json!("LATAM"));
    let error = manager.update(&changed, &stale).await.unwrap_err();
    assert!(matches!(error, TableError::PreconditionFailed));

    let current = UpdateOptions::new().if_column_equals("region", json!("APAC"));
    manager.update(&changed, &current).await.unwrap();

    let fetched = manager
        .get_by_primary_key(&[json!("cas-1"), json!(1)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.region, "EMEA");
}

#[tokio::test]
async fn test_upsert_creates_and_overwrites() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    let order = Order::new("ups-1", 1, "APAC");
    manager.upsert(&order, &UpsertOptions::default()).await.unwrap();

    let mut changed = order.clone();
    changed.region = "EMEA".into();
    manager.upsert(&changed, &UpsertOptions::default()).await.unwrap();

    let fetched = manager
        .get_by_primary_key(&[json!("ups-1"), json!(1)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.region, "EMEA");
}

#[tokio::test]
async fn test_delete_by_object_and_key() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    let order = Order::new("del-1", 1, "APAC");
    manager.insert(&order, &InsertOptions::default()).await.unwrap();
    manager.delete(&order).await.unwrap();
    assert!(manager
        .get_by_primary_key(&[json!("del-1"), json!(1)])
        .await
        .unwrap()
        .is_none());

    // Deleting by a partition-key prefix removes every clustering row.
    for item in 1..=3 {
        manager
            .insert(&Order::new("del-2", item, "APAC"), &InsertOptions::default())
            .await
            .unwrap();
    }
    manager.delete_by_primary_key(&[json!("del-2")]).await.unwrap();
    assert_eq!(manager.count_by_partition_key(&[json!("del-2")]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_using_options_conditions() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    // Conditional delete against a missing row reports the failed condition.
    let missing = DeleteOptions::new()
        .key("order_id", json!("del-opt"))
        .key("line_item", json!(1))
        .if_exists();
    let error = manager.delete_using_options(&missing).await.unwrap_err();
    assert!(matches!(error, TableError::PreconditionFailed));

    manager
        .insert(&Order::new("del-opt", 1, "APAC"), &InsertOptions::default())
        .await
        .unwrap();
    manager.delete_using_options(&missing).await.unwrap();
    assert!(manager
        .get_by_primary_key(&[json!("del-opt"), json!(1)])
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_insert_ttl_expires_to_not_found() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    let order = Order::new("ttl-1", 1, "APAC");
    let options = InsertOptions::new().ttl(Duration::from_secs(5));
    manager.insert(&order, &options).await.unwrap();

    assert!(manager.get_by_partition_key(&[json!("ttl-1")]).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(manager.get_by_partition_key(&[json!("ttl-1")]).await.unwrap().is_none());
}

#[tokio::test]
async fn test_insert_bulk_is_atomic_per_item() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    let mut orders: Vec<Order> = (0..10).map(|i| Order::new(&format!("bulk-{}", i), 1, "APAC")).collect();
    // A deliberate duplicate of the first key, ordered last so its twin has
    // already committed when it runs.
    orders.push(Order::new("bulk-0", 1, "EMEA"));

    let error = manager
        .insert_bulk(&orders, 4, &InsertOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(error, TableError::PreconditionFailed));

    // The duplicate did not block the other items from committing.
    assert_eq!(manager.count().await.unwrap(), 10);
    let survivor = manager
        .get_by_primary_key(&[json!("bulk-0"), json!(1)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(survivor.region, "APAC");
}

#[tokio::test]
async fn test_upsert_bulk() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    let orders: Vec<Order> = (0..25).map(|i| Order::new("ups-bulk", i, "APAC")).collect();
    manager.upsert_bulk(&orders, 0, &UpsertOptions::default()).await.unwrap();
    assert_eq!(manager.count_by_partition_key(&[json!("ups-bulk")]).await.unwrap(), 25);
}

#[tokio::test]
async fn test_write_retries_transient_timeouts() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    // Three ambiguous write timeouts, then the statement goes through.
    session.inject_write_timeouts(3);
    manager
        .insert(&Order::new("retry-1", 1, "APAC"), &InsertOptions::default())
        .await
        .unwrap();

    assert!(manager.get_by_partition_key(&[json!("retry-1")]).await.unwrap().is_some());
    assert_eq!(session.row_count(&orders_table()), 1);
}

#[tokio::test]
async fn test_non_retryable_errors_pass_through() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    session.inject_error(SessionError::Backend("connection reset".into()));
    let error = manager
        .insert(&Order::new("err-1", 1, "APAC"), &InsertOptions::default())
        .await
        .unwrap_err();
    match error {
        TableError::Session { operation, source, .. } => {
            assert_eq!(operation, "insert");
            assert!(!source.is_write_timeout());
        }
        other => panic!("expected a session error, got {:?}", other),
    }
    assert_eq!(session.row_count(&orders_table()), 0);
}

/// A session whose executions never complete, for deadline tests.
struct HangingSession;

#[async_trait::async_trait]
impl manta_cql::Session for HangingSession {
    async fn execute(&self, _request: &StatementRequest) -> Result<QueryResult, SessionError> {
        futures::future::pending::<()>().await;
        unreachable!("pending future never resolves")
    }

    async fn execute_ddl(&self, _ddl: &DdlStatement) -> Result<(), SessionError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_write_deadline_bounds_the_attempt_loop() {
    let manager: TableManager<Order> = TableManager::new(
        TableManagerConfig::new(common::TEST_KEYSPACE, common::orders_spec(), Arc::new(HangingSession))
            .query_timeout(Duration::from_secs(1)),
    )
    .await
    .unwrap();

    let error = manager
        .insert(&Order::new("dead-1", 1, "APAC"), &InsertOptions::default())
        .await
        .unwrap_err();
    match error {
        TableError::Timeout { operation, table } => {
            assert_eq!(operation, "insert");
            assert!(table.ends_with("orders"));
        }
        other => panic!("expected a timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_count_operations() {
    let session = Arc::new(MemorySession::new());
    let manager = orders_manager(&session).await;

    for item in 0..4 {
        manager
            .insert(&Order::new("count-a", item, "APAC"), &InsertOptions::default())
            .await
            .unwrap();
    }
    manager
        .insert(&Order::new("count-b", 0, "EMEA"), &InsertOptions::default())
        .await
        .unwrap();

    assert_eq!(manager.count().await.unwrap(), 5);
    assert_eq!(manager.count_by_partition_key(&[json!("count-a")]).await.unwrap(), 4);
}
