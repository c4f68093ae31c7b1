//! Racing callers against the SQLite store.

use pathway_engine::{ProgressionEngine, ProgressionError, Repositories};
use pathway_types::NodeStatus;

use crate::common::{TestDb, draft, node_at, pos};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_completions_of_one_node_have_one_winner() {
    let db = TestDb::new();
    let engine = db.engine();
    let path = engine
        .create_from_draft(draft(3), "anonymous")
        .await
        .unwrap();
    let first = node_at(&path, 1).id;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let path_id = path.id;
            tokio::spawn(async move { engine.complete_node(path_id, first, pos(1)).await })
        })
        .collect();

    let mut winners = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(completion) => {
                winners += 1;
                assert_eq!(completion.unlocked_next, Some(pos(2)));
            }
            Err(ProgressionError::InvalidTransition { from, .. }) => {
                assert_eq!(from, NodeStatus::Completed);
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);

    let stored = engine.path_with_nodes(path.id).await.unwrap().unwrap();
    let third = node_at(&stored, 3);
    assert_eq!(third.status(), NodeStatus::Locked);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_connections_unlock_at_most_once() {
    let db = TestDb::new();
    let engine = db.engine();
    let path = engine
        .create_from_draft(draft(2), "anonymous")
        .await
        .unwrap();

    let left = Repositories::sqlite(&db.open());
    let right = Repositories::sqlite(&db.open());
    let path_id = path.id;
    let a = tokio::spawn(async move { left.nodes.unlock_next(path_id, pos(1)).await });
    let b = tokio::spawn(async move { right.nodes.unlock_next(path_id, pos(1)).await });
    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

    assert!(a ^ b, "exactly one connection must observe the unlock");
    let node = engine
        .node(path.id, node_at(&path, 2).id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(node.status(), NodeStatus::Unlocked);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_paths_progress_in_parallel() {
    let db = TestDb::new();
    let engine = db.engine();

    let mut paths = Vec::new();
    for _ in 0..6 {
        paths.push(
            engine
                .create_from_draft(draft(2), "anonymous")
                .await
                .unwrap(),
        );
    }

    let tasks: Vec<_> = paths
        .iter()
        .map(|path| {
            let engine: ProgressionEngine = engine.clone();
            let path_id = path.id;
            let node_id = node_at(path, 1).id;
            tokio::spawn(async move { engine.complete_node(path_id, node_id, pos(1)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for path in &paths {
        let progress = engine.progress(path.id).await.unwrap().unwrap();
        assert_eq!(progress.completed_nodes, 1);
        assert_eq!(progress.current, Some(node_at(path, 2).id));
    }
}
