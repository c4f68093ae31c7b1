//! Unit tests for the engine crate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pathway_store::{NodeRepository, PathRepository, StoreError, StoreFut};
use pathway_types::{
    LearningPath, NodeId, NodeStatus, PathDraft, PathId, PathNode, PathStatus, Position,
};

use super::*;

fn pos(value: u32) -> Position {
    Position::try_new(value).unwrap()
}

fn draft(node_count: usize) -> PathDraft {
    let nodes: Vec<serde_json::Value> = (1..=node_count)
        .map(|i| serde_json::json!({ "title": format!("Exercise {i}"), "xp_reward": 50 }))
        .collect();
    serde_json::from_value(serde_json::json!({
        "topic": "Learn Go basics",
        "title": "Go Fundamentals",
        "nodes": nodes,
    }))
    .unwrap()
}

async fn seeded(engine: &ProgressionEngine, node_count: usize) -> LearningPath {
    engine
        .create_from_draft(draft(node_count), "anonymous")
        .await
        .unwrap()
}

fn node_at(path: &LearningPath, position: u32) -> &PathNode {
    &path.nodes().unwrap()[position as usize - 1]
}

async fn statuses(engine: &ProgressionEngine, path_id: PathId) -> Vec<NodeStatus> {
    engine
        .path_with_nodes(path_id)
        .await
        .unwrap()
        .unwrap()
        .nodes()
        .unwrap()
        .iter()
        .map(PathNode::status)
        .collect()
}

fn injected(operation: &'static str) -> StoreError {
    StoreError::Unavailable {
        operation,
        source: "injected failure".into(),
    }
}

/// Node repository that can be told to fail `unlock_next`, or to archive the
/// path just before the cascade looks up its last position.
struct FlakyNodes {
    inner: Arc<dyn NodeRepository>,
    paths: Arc<dyn PathRepository>,
    fail_unlock: AtomicBool,
    archive_on_lookup: AtomicBool,
}

impl NodeRepository for FlakyNodes {
    fn create_batch<'a>(&'a self, nodes: &'a [PathNode]) -> StoreFut<'a, ()> {
        self.inner.create_batch(nodes)
    }

    fn get_by_id(&self, id: NodeId) -> StoreFut<'_, Option<PathNode>> {
        self.inner.get_by_id(id)
    }

    fn get_by_path_id(&self, path_id: PathId) -> StoreFut<'_, Vec<PathNode>> {
        self.inner.get_by_path_id(path_id)
    }

    fn last_position(&self, path_id: PathId) -> StoreFut<'_, Option<Position>> {
        if !self.archive_on_lookup.load(Ordering::SeqCst) {
            return self.inner.last_position(path_id);
        }
        Box::pin(async move {
            self.paths
                .update_status(path_id, PathStatus::Archived)
                .await?;
            self.inner.last_position(path_id).await
        })
    }

    fn update_status(&self, id: NodeId, status: NodeStatus) -> StoreFut<'_, ()> {
        self.inner.update_status(id, status)
    }

    fn transition_status(
        &self,
        id: NodeId,
        from: NodeStatus,
        to: NodeStatus,
    ) -> StoreFut<'_, bool> {
        self.inner.transition_status(id, from, to)
    }

    fn unlock_next(&self, path_id: PathId, current: Position) -> StoreFut<'_, bool> {
        if self.fail_unlock.load(Ordering::SeqCst) {
            return Box::pin(std::future::ready(Err(injected("nodes.unlock_next"))));
        }
        self.inner.unlock_next(path_id, current)
    }
}

/// Path repository that can be told to fail status transitions.
struct FlakyPaths {
    inner: Arc<dyn PathRepository>,
    fail_transition: AtomicBool,
}

impl PathRepository for FlakyPaths {
    fn create<'a>(&'a self, path: &'a LearningPath) -> StoreFut<'a, ()> {
        self.inner.create(path)
    }

    fn get_by_id(&self, id: PathId) -> StoreFut<'_, Option<LearningPath>> {
        self.inner.get_by_id(id)
    }

    fn get_by_id_with_nodes(&self, id: PathId) -> StoreFut<'_, Option<LearningPath>> {
        self.inner.get_by_id_with_nodes(id)
    }

    fn get_by_user_id<'a>(&'a self, user_id: &'a str) -> StoreFut<'a, Vec<LearningPath>> {
        self.inner.get_by_user_id(user_id)
    }

    fn update_status(&self, id: PathId, status: PathStatus) -> StoreFut<'_, ()> {
        self.inner.update_status(id, status)
    }

    fn transition_status(
        &self,
        id: PathId,
        from: PathStatus,
        to: PathStatus,
    ) -> StoreFut<'_, bool> {
        if self.fail_transition.load(Ordering::SeqCst) {
            return Box::pin(std::future::ready(Err(injected("paths.transition_status"))));
        }
        self.inner.transition_status(id, from, to)
    }
}

fn flaky_engine() -> (ProgressionEngine, Arc<FlakyPaths>, Arc<FlakyNodes>) {
    let repos = Repositories::in_memory();
    let nodes = Arc::new(FlakyNodes {
        inner: repos.nodes,
        paths: Arc::clone(&repos.paths),
        fail_unlock: AtomicBool::new(false),
        archive_on_lookup: AtomicBool::new(false),
    });
    let paths = Arc::new(FlakyPaths {
        inner: repos.paths,
        fail_transition: AtomicBool::new(false),
    });
    let engine = ProgressionEngine::new(Repositories {
        paths: paths.clone(),
        nodes: nodes.clone(),
    });
    (engine, paths, nodes)
}

#[tokio::test]
async fn three_node_path_progresses_to_completion() {
    use NodeStatus::{Completed, Locked, Unlocked};

    let engine = ProgressionEngine::new(Repositories::in_memory());
    let path = seeded(&engine, 3).await;
    assert_eq!(statuses(&engine, path.id).await, vec![Unlocked, Locked, Locked]);

    let first = engine
        .complete_node(path.id, node_at(&path, 1).id, pos(1))
        .await
        .unwrap();
    assert_eq!(first.unlocked_next, Some(pos(2)));
    assert!(!first.path_completed);
    assert_eq!(statuses(&engine, path.id).await, vec![Completed, Unlocked, Locked]);
    let stored = engine.path_with_nodes(path.id).await.unwrap().unwrap();
    assert_eq!(stored.status(), PathStatus::Active);

    engine
        .complete_node(path.id, node_at(&path, 2).id, pos(2))
        .await
        .unwrap();
    assert_eq!(statuses(&engine, path.id).await, vec![Completed, Completed, Unlocked]);

    let last = engine
        .complete_node(path.id, node_at(&path, 3).id, pos(3))
        .await
        .unwrap();
    assert_eq!(last.unlocked_next, None);
    assert!(last.path_completed);
    let stored = engine.path_with_nodes(path.id).await.unwrap().unwrap();
    assert_eq!(stored.status(), PathStatus::Completed);
}

#[tokio::test]
async fn completing_a_locked_node_is_rejected() {
    let engine = ProgressionEngine::new(Repositories::in_memory());
    let path = seeded(&engine, 2).await;

    let err = engine
        .complete_node(path.id, node_at(&path, 2).id, pos(2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProgressionError::InvalidTransition {
            from: NodeStatus::Locked,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn completing_twice_is_rejected_without_side_effects() {
    let engine = ProgressionEngine::new(Repositories::in_memory());
    let path = seeded(&engine, 2).await;
    let first = node_at(&path, 1).id;

    engine.complete_node(path.id, first, pos(1)).await.unwrap();
    let err = engine.complete_node(path.id, first, pos(1)).await.unwrap_err();
    assert!(matches!(
        err,
        ProgressionError::InvalidTransition {
            from: NodeStatus::Completed,
            ..
        }
    ));
}

#[tokio::test]
async fn concurrent_completions_of_one_node_succeed_once() {
    let engine = ProgressionEngine::new(Repositories::in_memory());
    let path = seeded(&engine, 2).await;
    let first = node_at(&path, 1).id;

    let (a, b) = tokio::join!(
        engine.complete_node(path.id, first, pos(1)),
        engine.complete_node(path.id, first, pos(1)),
    );
    assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
}

#[tokio::test]
async fn wrong_position_or_path_is_a_mismatch() {
    let engine = ProgressionEngine::new(Repositories::in_memory());
    let path = seeded(&engine, 2).await;
    let other = seeded(&engine, 1).await;
    let first = node_at(&path, 1).id;

    let err = engine.complete_node(path.id, first, pos(2)).await.unwrap_err();
    assert!(matches!(err, ProgressionError::NodeMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = engine.complete_node(other.id, first, pos(1)).await.unwrap_err();
    assert!(matches!(err, ProgressionError::NodeMismatch { .. }));
}

#[tokio::test]
async fn unknown_node_is_not_found() {
    let engine = ProgressionEngine::new(Repositories::in_memory());
    let path = seeded(&engine, 1).await;

    let missing = NodeId::new();
    let err = engine
        .complete_node(path.id, missing, pos(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressionError::NodeNotFound(id) if id == missing));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn archived_paths_do_not_progress() {
    let repos = Repositories::in_memory();
    let engine = ProgressionEngine::new(repos.clone());
    let path = seeded(&engine, 2).await;
    repos
        .paths
        .update_status(path.id, PathStatus::Archived)
        .await
        .unwrap();

    let err = engine
        .complete_node(path.id, node_at(&path, 1).id, pos(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProgressionError::PathNotActive {
            status: PathStatus::Archived,
            ..
        }
    ));
    let err = engine.resume_cascade(path.id, pos(1)).await.unwrap_err();
    assert!(matches!(err, ProgressionError::PathNotActive { .. }));
}

#[tokio::test]
async fn failed_unlock_leaves_node_completed_and_resumes() {
    use NodeStatus::{Completed, Locked};

    let (engine, _, nodes) = flaky_engine();
    let path = seeded(&engine, 2).await;
    let first = node_at(&path, 1).id;

    nodes.fail_unlock.store(true, Ordering::SeqCst);
    let err = engine.complete_node(path.id, first, pos(1)).await.unwrap_err();
    assert!(matches!(
        err,
        ProgressionError::CascadeIncomplete {
            step: CascadeStep::UnlockNext,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(statuses(&engine, path.id).await, vec![Completed, Locked]);

    nodes.fail_unlock.store(false, Ordering::SeqCst);
    let resumed = engine.resume_cascade(path.id, pos(1)).await.unwrap();
    assert_eq!(resumed.unlocked_next, Some(pos(2)));
    assert_eq!(
        statuses(&engine, path.id).await,
        vec![Completed, NodeStatus::Unlocked]
    );

    // A second resume changes nothing.
    let again = engine.resume_cascade(path.id, pos(1)).await.unwrap();
    assert_eq!(again.unlocked_next, None);
    assert!(!again.path_completed);
}

#[tokio::test]
async fn failed_path_completion_is_resumable() {
    let (engine, paths, _) = flaky_engine();
    let path = seeded(&engine, 1).await;
    let only = node_at(&path, 1).id;

    paths.fail_transition.store(true, Ordering::SeqCst);
    let err = engine.complete_node(path.id, only, pos(1)).await.unwrap_err();
    assert!(matches!(
        err,
        ProgressionError::CascadeIncomplete {
            step: CascadeStep::CompletePath,
            ..
        }
    ));
    let stored = engine.path_with_nodes(path.id).await.unwrap().unwrap();
    assert_eq!(stored.status(), PathStatus::Active);

    paths.fail_transition.store(false, Ordering::SeqCst);
    let resumed = engine.resume_cascade(path.id, pos(1)).await.unwrap();
    assert!(resumed.path_completed);
    let stored = engine.path_with_nodes(path.id).await.unwrap().unwrap();
    assert_eq!(stored.status(), PathStatus::Completed);

    // Completed paths may still be resumed; nothing further happens.
    let again = engine.resume_cascade(path.id, pos(1)).await.unwrap();
    assert!(!again.path_completed);
}

#[tokio::test]
async fn path_archived_mid_cascade_stays_archived() {
    let (engine, _, nodes) = flaky_engine();
    let path = seeded(&engine, 1).await;

    nodes.archive_on_lookup.store(true, Ordering::SeqCst);
    let completion = engine
        .complete_node(path.id, node_at(&path, 1).id, pos(1))
        .await
        .unwrap();
    assert!(!completion.path_completed);

    let stored = engine.path_with_nodes(path.id).await.unwrap().unwrap();
    assert_eq!(stored.status(), PathStatus::Archived);
    assert_eq!(stored.nodes().unwrap()[0].status(), NodeStatus::Completed);
}

#[tokio::test]
async fn resume_requires_a_completed_node() {
    let engine = ProgressionEngine::new(Repositories::in_memory());
    let path = seeded(&engine, 2).await;

    let err = engine.resume_cascade(path.id, pos(1)).await.unwrap_err();
    assert!(matches!(
        err,
        ProgressionError::InvalidTransition {
            from: NodeStatus::Unlocked,
            ..
        }
    ));
    let err = engine.resume_cascade(path.id, pos(9)).await.unwrap_err();
    assert!(matches!(err, ProgressionError::PositionNotFound { .. }));
}

#[tokio::test]
async fn malformed_paths_are_rejected_before_any_write() {
    let engine = ProgressionEngine::new(Repositories::in_memory());
    let (path, mut nodes) = draft(2).into_entities("anonymous").unwrap();
    nodes[1] = nodes[1].clone().with_status(NodeStatus::Unlocked);

    let err = engine.create_path(&path, &nodes).await.unwrap_err();
    assert!(matches!(err, ProgressionError::MalformedPath(_)));
    assert!(engine.path_with_nodes(path.id).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_path_is_a_conflict() {
    let engine = ProgressionEngine::new(Repositories::in_memory());
    let (path, nodes) = draft(1).into_entities("anonymous").unwrap();
    engine.create_path(&path, &nodes).await.unwrap();

    let err = engine.create_path(&path, &nodes).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn node_lookup_is_scoped_to_its_path() {
    let engine = ProgressionEngine::new(Repositories::in_memory());
    let path = seeded(&engine, 1).await;
    let other = seeded(&engine, 1).await;
    let id = node_at(&path, 1).id;

    assert!(engine.node(path.id, id).await.unwrap().is_some());
    assert!(engine.node(other.id, id).await.unwrap().is_none());
}

#[tokio::test]
async fn progress_tracks_xp_and_current_node() {
    let engine = ProgressionEngine::new(Repositories::in_memory());
    let path = seeded(&engine, 3).await;
    engine
        .complete_node(path.id, node_at(&path, 1).id, pos(1))
        .await
        .unwrap();

    let progress = engine.progress(path.id).await.unwrap().unwrap();
    assert_eq!(progress.completed_nodes, 1);
    assert_eq!(progress.xp_earned, 50);
    assert_eq!(progress.xp_available, 150);
    assert_eq!(progress.current, Some(node_at(&path, 2).id));
    assert!(engine.progress(PathId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn user_paths_list_newest_first() {
    let engine = ProgressionEngine::new(Repositories::in_memory());
    let older = seeded(&engine, 1).await;
    let newer = seeded(&engine, 1).await;

    let ids: Vec<PathId> = engine
        .paths_for_user("anonymous")
        .await
        .unwrap()
        .iter()
        .map(|path| path.id)
        .collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}
