//! Persistence contracts the progression engine depends on.
//!
//! Both traits are object safe: operations return boxed `Send` futures so
//! callers can hold `Arc<dyn PathRepository>` / `Arc<dyn NodeRepository>` and
//! swap backends freely. Dropping a returned future cancels the operation;
//! the SQLite adapter aborts the running statement and rolls back.
//!
//! Lookups by id return `Ok(None)` for absent records. Absence is not an
//! error at this layer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use pathway_types::{LearningPath, NodeId, NodeStatus, PathId, PathNode, PathStatus, Position};

use crate::StoreError;
use crate::database::Database;
use crate::memory::MemoryStore;
use crate::sqlite::{SqliteNodeRepository, SqlitePathRepository};

pub type StoreFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

pub trait PathRepository: Send + Sync {
    /// Insert one new path row. Any loaded nodes on `path` are ignored.
    ///
    /// Fails with [`StoreError::Conflict`] if the id already exists.
    fn create<'a>(&'a self, path: &'a LearningPath) -> StoreFut<'a, ()>;

    /// The path without its nodes.
    fn get_by_id(&self, id: PathId) -> StoreFut<'_, Option<LearningPath>>;

    /// The path with its nodes loaded in ascending position order.
    fn get_by_id_with_nodes(&self, id: PathId) -> StoreFut<'_, Option<LearningPath>>;

    /// Every path owned by `user_id`, newest first. Empty if none.
    fn get_by_user_id<'a>(&'a self, user_id: &'a str) -> StoreFut<'a, Vec<LearningPath>>;

    /// Overwrite the status and bump `updated_at`.
    ///
    /// Fails with [`StoreError::NotFound`] if no such path exists.
    fn update_status(&self, id: PathId, status: PathStatus) -> StoreFut<'_, ()>;

    /// Atomically move a path from `from` to `to`.
    ///
    /// Returns `true` if this call performed the change, `false` if the path
    /// was not in `from`. Fails with [`StoreError::NotFound`] if the path is
    /// missing.
    fn transition_status(&self, id: PathId, from: PathStatus, to: PathStatus)
    -> StoreFut<'_, bool>;
}

pub trait NodeRepository: Send + Sync {
    /// Insert all nodes as one atomic unit. Either every node persists or none do.
    ///
    /// An empty slice succeeds without touching the store.
    fn create_batch<'a>(&'a self, nodes: &'a [PathNode]) -> StoreFut<'a, ()>;

    fn get_by_id(&self, id: NodeId) -> StoreFut<'_, Option<PathNode>>;

    /// Nodes of a path in ascending position order.
    fn get_by_path_id(&self, path_id: PathId) -> StoreFut<'_, Vec<PathNode>>;

    /// Highest position among the path's nodes. `None` if it has no nodes.
    fn last_position(&self, path_id: PathId) -> StoreFut<'_, Option<Position>>;

    /// Overwrite the status and bump `updated_at`.
    ///
    /// Fails with [`StoreError::NotFound`] if no such node exists.
    fn update_status(&self, id: NodeId, status: NodeStatus) -> StoreFut<'_, ()>;

    /// Atomically move a node from `from` to `to`.
    ///
    /// Returns `true` if this call performed the change, `false` if the node
    /// was not in `from`. Fails with [`StoreError::NotFound`] if the node is
    /// missing.
    fn transition_status(&self, id: NodeId, from: NodeStatus, to: NodeStatus)
    -> StoreFut<'_, bool>;

    /// Unlock the node at `current + 1` if, and only if, it is still locked.
    ///
    /// Executes as a single conditional update. Returns `true` for exactly
    /// one caller among any number racing on the same slot; `false` when the
    /// next node is missing or already past `locked`.
    fn unlock_next(&self, path_id: PathId, current: Position) -> StoreFut<'_, bool>;
}

/// A path repository and a node repository backed by the same store.
#[derive(Clone)]
pub struct Repositories {
    pub paths: Arc<dyn PathRepository>,
    pub nodes: Arc<dyn NodeRepository>,
}

impl Repositories {
    #[must_use]
    pub fn sqlite(db: &Database) -> Self {
        Self {
            paths: Arc::new(SqlitePathRepository::new(db.clone())),
            nodes: Arc::new(SqliteNodeRepository::new(db.clone())),
        }
    }

    #[must_use]
    pub fn memory(store: &MemoryStore) -> Self {
        Self {
            paths: Arc::new(store.path_repository()),
            nodes: Arc::new(store.node_repository()),
        }
    }

    /// A fresh, empty in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::memory(&MemoryStore::new())
    }
}
