//! End-to-end progression over a file-backed SQLite store.

use pathway_types::{NodeStatus, PathStatus};

use crate::common::{TestDb, draft, node_at, pos};

fn statuses(path: &pathway_types::LearningPath) -> Vec<NodeStatus> {
    path.nodes()
        .unwrap_or_default()
        .iter()
        .map(pathway_types::PathNode::status)
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn three_node_path_completes_in_order() {
    use NodeStatus::{Completed, Locked, Unlocked};

    let db = TestDb::new();
    let engine = db.engine();
    let path = engine
        .create_from_draft(draft(3), "anonymous")
        .await
        .unwrap();

    let stored = engine.path_with_nodes(path.id).await.unwrap().unwrap();
    assert_eq!(statuses(&stored), vec![Unlocked, Locked, Locked]);
    assert_eq!(stored.status(), PathStatus::Active);

    engine
        .complete_node(path.id, node_at(&path, 1).id, pos(1))
        .await
        .unwrap();
    let stored = engine.path_with_nodes(path.id).await.unwrap().unwrap();
    assert_eq!(statuses(&stored), vec![Completed, Unlocked, Locked]);
    assert_eq!(stored.status(), PathStatus::Active);

    engine
        .complete_node(path.id, node_at(&path, 2).id, pos(2))
        .await
        .unwrap();
    let stored = engine.path_with_nodes(path.id).await.unwrap().unwrap();
    assert_eq!(statuses(&stored), vec![Completed, Completed, Unlocked]);
    assert_eq!(stored.status(), PathStatus::Active);

    let last = engine
        .complete_node(path.id, node_at(&path, 3).id, pos(3))
        .await
        .unwrap();
    assert!(last.path_completed);
    let stored = engine.path_with_nodes(path.id).await.unwrap().unwrap();
    assert_eq!(statuses(&stored), vec![Completed, Completed, Completed]);
    assert_eq!(stored.status(), PathStatus::Completed);
}

#[tokio::test]
async fn progress_survives_reopening_the_database() {
    let db = TestDb::new();
    let path = {
        let engine = db.engine();
        let path = engine
            .create_from_draft(draft(2), "anonymous")
            .await
            .unwrap();
        engine
            .complete_node(path.id, node_at(&path, 1).id, pos(1))
            .await
            .unwrap();
        path
    };

    let engine = db.engine();
    let stored = engine.path_with_nodes(path.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Go Fundamentals");
    assert_eq!(stored.user_id, "anonymous");
    assert_eq!(
        statuses(&stored),
        vec![NodeStatus::Completed, NodeStatus::Unlocked]
    );

    let original = node_at(&path, 2);
    let reloaded = node_at(&stored, 2);
    assert_eq!(reloaded.content, original.content);
    assert_eq!(reloaded.created_at, original.created_at);
}

#[tokio::test]
async fn user_listing_spans_paths_newest_first() {
    let db = TestDb::new();
    let engine = db.engine();
    let first = engine.create_from_draft(draft(1), "ada").await.unwrap();
    let second = engine.create_from_draft(draft(2), "ada").await.unwrap();
    engine.create_from_draft(draft(1), "grace").await.unwrap();

    let listed = engine.paths_for_user("ada").await.unwrap();
    let ids: Vec<_> = listed.iter().map(|path| path.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert!(listed.iter().all(|path| path.nodes().is_none()));
}
