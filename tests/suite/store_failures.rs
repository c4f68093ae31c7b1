//! Store failures surface as typed, retryable engine errors.

use std::time::Duration;

use pathway_engine::{ErrorKind, ProgressionEngine, ProgressionError, Repositories};
use pathway_store::{DatabaseOptions, StoreError};
use pathway_types::PathId;

use crate::common::{TestDb, draft};

#[tokio::test]
async fn expired_deadline_is_store_unavailable() {
    let db = TestDb::new();
    let engine = ProgressionEngine::new(Repositories::sqlite(&db.open_with(DatabaseOptions {
        operation_timeout: Some(Duration::ZERO),
        ..DatabaseOptions::default()
    })));

    let err = engine.path_with_nodes(PathId::new()).await.unwrap_err();
    assert!(matches!(
        err,
        ProgressionError::Store(StoreError::DeadlineExceeded { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn failed_create_writes_nothing() {
    let db = TestDb::new();
    let engine = db.engine();
    let (path, mut nodes) = draft(3).into_entities("anonymous").unwrap();
    // Two nodes claiming the same id: the batch must not half-apply.
    nodes[2] = nodes[2].clone().with_id(nodes[1].id);

    let err = engine.create_path(&path, &nodes).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let stored = engine.path_with_nodes(path.id).await.unwrap().unwrap();
    assert_eq!(stored.nodes().map(<[_]>::len), Some(0));
}

#[tokio::test]
async fn corrupt_rows_are_reported_not_skipped() {
    let db = TestDb::new();
    let engine = db.engine();
    let path = engine
        .create_from_draft(draft(1), "anonymous")
        .await
        .unwrap();

    let conn = rusqlite_connection(db.path());
    conn.execute(
        "UPDATE learning_paths SET created_at = 'yesterday' WHERE id = ?1",
        [path.id.to_string()],
    )
    .unwrap();
    drop(conn);

    let err = engine.path_with_nodes(path.id).await.unwrap_err();
    assert!(matches!(
        err,
        ProgressionError::Store(StoreError::Corrupt { .. })
    ));
    assert!(!err.is_retryable());
}

fn rusqlite_connection(path: &std::path::Path) -> rusqlite::Connection {
    rusqlite::Connection::open(path).unwrap()
}
