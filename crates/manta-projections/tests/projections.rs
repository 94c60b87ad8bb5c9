//! End-to-end behaviour of the projection consistency protocol.

use std::sync::Arc;

use manta_cql::test_utils::MemorySession;
use manta_cql::Session;
use manta_metadata::{ColumnSpecification, PartitioningColumn, TableSpecification};
use manta_projections::{
    FanOutStage, ProjectionError, ProjectionManager, ProjectionManagerConfig,
    ProjectionSpecification,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

const KEYSPACE: &str = "manta_test";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: String,
    region: String,
    name: String,
}

impl User {
    fn new(id: &str, region: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            region: region.to_string(),
            name: name.to_string(),
        }
    }
}

fn users_spec() -> TableSpecification {
    TableSpecification {
        name: "users".into(),
        columns: vec![
            ColumnSpecification::partition_key("id", "text"),
            ColumnSpecification::new("region", "text"),
            ColumnSpecification::new("name", "text"),
        ],
        partitioning: vec![PartitioningColumn::new("id", 0)],
        clustering: vec![],
        indexes: Default::default(),
    }
}

fn by_region() -> ProjectionSpecification {
    ProjectionSpecification::new("users_by_region")
        .partition_by("region")
        .cluster_by("id", false)
}

async fn region_manager(session: &Arc<MemorySession>) -> ProjectionManager<User> {
    ProjectionManager::new(
        ProjectionManagerConfig::new(KEYSPACE, users_spec(), session.clone())
            .track_columns(["region"])
            .projection(by_region())
            .install_schema(),
    )
    .await
    .expect("projection manager should start")
}

#[tokio::test]
async fn test_change_projects_the_row() {
    let session = Arc::new(MemorySession::new());
    let manager = region_manager(&session).await;

    manager
        .process_change(&User::new("u1", "APAC", "Avery"))
        .await
        .unwrap();

    let projected = manager
        .projection("users_by_region")
        .unwrap()
        .get_by_partition_key(&[json!("APAC")])
        .await
        .unwrap()
        .expect("row should be projected");
    assert_eq!(projected, User::new("u1", "APAC", "Avery"));
}

#[tokio::test]
async fn test_key_change_moves_the_row_instead_of_duplicating() {
    let session = Arc::new(MemorySession::new());
    let manager = region_manager(&session).await;
    let reader = manager.projection("users_by_region").unwrap();

    manager
        .process_change(&User::new("u1", "APAC", "Avery"))
        .await
        .unwrap();
    manager
        .process_change(&User::new("u1", "EMEA", "Avery"))
        .await
        .unwrap();

    // Moved, not duplicated: the old coordinates are empty.
    assert!(reader.get_by_partition_key(&[json!("APAC")]).await.unwrap().is_none());
    let moved = reader
        .get_by_partition_key(&[json!("EMEA")])
        .await
        .unwrap()
        .expect("row should exist at its new coordinates");
    assert_eq!(moved.id, "u1");
}

#[tokio::test]
async fn test_delete_clears_projection_and_control_state() {
    let session = Arc::new(MemorySession::new());
    let manager = region_manager(&session).await;
    let reader = manager.projection("users_by_region").unwrap();

    let user = User::new("u1", "EMEA", "Avery");
    manager.process_change(&user).await.unwrap();
    manager.process_delete(&user).await.unwrap();

    assert!(reader.get_by_partition_key(&[json!("EMEA")]).await.unwrap().is_none());
    assert_eq!(session.row_count(&format!("{}.users_ctrl", KEYSPACE)), 0);
    assert_eq!(session.row_count(&format!("{}.users_by_region", KEYSPACE)), 0);
}

#[tokio::test]
async fn test_delete_without_prior_observation_is_a_no_op() {
    let session = Arc::new(MemorySession::new());
    let manager = region_manager(&session).await;

    manager
        .process_delete(&User::new("ghost", "APAC", "Nobody"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_multiple_projections_stay_consistent() {
    let session = Arc::new(MemorySession::new());
    let manager: ProjectionManager<User> = ProjectionManager::new(
        ProjectionManagerConfig::new(KEYSPACE, users_spec(), session.clone())
            .track_columns(["region", "name"])
            .projection(by_region())
            .projection(
                ProjectionSpecification::new("users_by_name")
                    .partition_by("name")
                    .cluster_by("id", false),
            )
            .install_schema(),
    )
    .await
    .unwrap();

    manager
        .process_change(&User::new("u1", "APAC", "Avery"))
        .await
        .unwrap();
    manager
        .process_change(&User::new("u1", "EMEA", "Blair"))
        .await
        .unwrap();

    let by_region = manager.projection("users_by_region").unwrap();
    let by_name = manager.projection("users_by_name").unwrap();

    assert!(by_region.get_by_partition_key(&[json!("APAC")]).await.unwrap().is_none());
    assert!(by_name.get_by_partition_key(&[json!("Avery")]).await.unwrap().is_none());
    assert!(by_region.get_by_partition_key(&[json!("EMEA")]).await.unwrap().is_some());
    assert!(by_name.get_by_partition_key(&[json!("Blair")]).await.unwrap().is_some());
}

#[tokio::test]
async fn test_projection_reader_supports_point_lookups() {
    let session = Arc::new(MemorySession::new());
    let manager = region_manager(&session).await;

    manager
        .process_change(&User::new("u1", "APAC", "Avery"))
        .await
        .unwrap();
    manager
        .process_change(&User::new("u2", "APAC", "Blair"))
        .await
        .unwrap();

    let reader = manager.projection("users_by_region").unwrap();
    let by_full_key = reader
        .get_by_primary_key(&[json!("APAC"), json!("u2")])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_full_key.name, "Blair");

    assert_eq!(reader.count_by_partition_key(&[json!("APAC")]).await.unwrap(), 2);
    assert!(manager.projection("users_by_name").is_none());
}

#[tokio::test]
async fn test_configuration_errors_fail_fast() {
    let session = Arc::new(MemorySession::new());

    // Projection that drops the base key column.
    let missing_key = ProjectionManager::<User>::new(
        ProjectionManagerConfig::new(KEYSPACE, users_spec(), session.clone())
            .track_columns(["region"])
            .projection(ProjectionSpecification::new("broken").partition_by("region"))
            .install_schema(),
    )
    .await;
    assert!(matches!(
        missing_key.unwrap_err(),
        ProjectionError::MissingKeyColumns { .. }
    ));

    // Projection keyed on a non-key column that is not tracked.
    let untracked = ProjectionManager::<User>::new(
        ProjectionManagerConfig::new(KEYSPACE, users_spec(), session.clone())
            .projection(by_region())
            .install_schema(),
    )
    .await;
    assert!(matches!(
        untracked.unwrap_err(),
        ProjectionError::UntrackedKeyColumn { .. }
    ));

    // A tracked column must resolve to a non-key base column.
    let bad_tracked = ProjectionManager::<User>::new(
        ProjectionManagerConfig::new(KEYSPACE, users_spec(), session.clone())
            .track_columns(["id"])
            .install_schema(),
    )
    .await;
    assert!(matches!(
        bad_tracked.unwrap_err(),
        ProjectionError::InvalidTrackedColumn { .. }
    ));
}

#[tokio::test]
async fn test_cleanup_failure_aborts_before_any_write() {
    let session = Arc::new(MemorySession::new());

    // Establish a projected row through a fully installed manager.
    let manager = region_manager(&session).await;
    manager
        .process_change(&User::new("u1", "APAC", "Avery"))
        .await
        .unwrap();

    // A second manager also maintains a projection whose table was never
    // installed, so its cleanup delete fails.
    let broken: ProjectionManager<User> = ProjectionManager::new(
        ProjectionManagerConfig::new(KEYSPACE, users_spec(), session.clone())
            .track_columns(["region"])
            .projection(by_region())
            .projection(
                ProjectionSpecification::new("users_by_nowhere")
                    .partition_by("region")
                    .cluster_by("id", false),
            ),
    )
    .await
    .unwrap();

    let error = broken
        .process_change(&User::new("u1", "EMEA", "Avery"))
        .await
        .unwrap_err();
    match error {
        ProjectionError::FanOut { stage, projection, .. } => {
            assert_eq!(stage, FanOutStage::Cleanup);
            assert_eq!(projection, "users_by_nowhere");
        }
        other => panic!("expected a fan-out error, got {:?}", other),
    }

    // The whole call aborted before any write: the control record still
    // carries the old tracked value.
    let control = session
        .execute(&manta_cql::StatementRequest::new(manta_cql::Statement::Select(
            manta_cql::SelectStatement::new(format!("{}.users_ctrl", KEYSPACE))
                .filter(manta_cql::Predicate::eq("id"), json!("u1")),
        )))
        .await
        .unwrap();
    assert_eq!(control.first().unwrap().as_str("region"), Some("APAC"));
}
