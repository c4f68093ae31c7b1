//! In-process store with the same observable contract as the SQLite adapter.
//!
//! All state lives behind one mutex, so every operation (including a whole
//! batch insert or a compare-and-set) is atomic with respect to the others.
//! Operations never block on IO, so the returned futures are already ready.

use std::collections::HashMap;
use std::future::ready;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use pathway_types::{LearningPath, NodeId, NodeStatus, PathId, PathNode, PathStatus, Position};

use crate::repository::{NodeRepository, PathRepository, StoreFut};
use crate::{Record, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    paths: HashMap<PathId, StoredPath>,
    nodes: HashMap<NodeId, PathNode>,
    next_seq: u64,
}

#[derive(Debug)]
struct StoredPath {
    /// Insertion order, breaks ties between equal `created_at` stamps.
    seq: u64,
    path: LearningPath,
}

impl MemoryState {
    fn nodes_of(&self, path_id: PathId) -> Vec<PathNode> {
        let mut nodes: Vec<PathNode> = self
            .nodes
            .values()
            .filter(|node| node.path_id == path_id)
            .cloned()
            .collect();
        nodes.sort_by_key(|node| node.position);
        nodes
    }

    fn slot_taken(&self, path_id: PathId, position: Position) -> bool {
        self.nodes
            .values()
            .any(|node| node.path_id == path_id && node.position == position)
    }
}

/// Shared in-memory backing for [`MemoryPathRepository`] and
/// [`MemoryNodeRepository`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn path_repository(&self) -> MemoryPathRepository {
        MemoryPathRepository {
            store: self.clone(),
        }
    }

    #[must_use]
    pub fn node_repository(&self) -> MemoryNodeRepository {
        MemoryNodeRepository {
            store: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn done<'a, T: Send + 'a>(result: Result<T, StoreError>) -> StoreFut<'a, T> {
    Box::pin(ready(result))
}

#[derive(Debug, Clone)]
pub struct MemoryPathRepository {
    store: MemoryStore,
}

impl MemoryPathRepository {
    fn create_now(&self, path: &LearningPath) -> Result<(), StoreError> {
        let mut state = self.store.lock();
        if state.paths.contains_key(&path.id) {
            return Err(StoreError::Conflict(Record::Path(path.id)));
        }
        let mut stored = path.clone();
        let _ = stored.take_nodes();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.paths.insert(path.id, StoredPath { seq, path: stored });
        Ok(())
    }

    fn update_status_now(&self, id: PathId, status: PathStatus) -> Result<(), StoreError> {
        let mut state = self.store.lock();
        let stored = state
            .paths
            .get_mut(&id)
            .ok_or(StoreError::NotFound(Record::Path(id)))?;
        let path = &stored.path;
        stored.path = path
            .clone()
            .with_status(status)
            .with_timestamps(path.created_at, Utc::now());
        Ok(())
    }

    fn transition_now(
        &self,
        id: PathId,
        from: PathStatus,
        to: PathStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.store.lock();
        let stored = state
            .paths
            .get_mut(&id)
            .ok_or(StoreError::NotFound(Record::Path(id)))?;
        if stored.path.status() != from {
            return Ok(false);
        }
        let path = &stored.path;
        stored.path = path
            .clone()
            .with_status(to)
            .with_timestamps(path.created_at, Utc::now());
        Ok(true)
    }
}

impl PathRepository for MemoryPathRepository {
    fn create<'a>(&'a self, path: &'a LearningPath) -> StoreFut<'a, ()> {
        done(self.create_now(path))
    }

    fn get_by_id(&self, id: PathId) -> StoreFut<'_, Option<LearningPath>> {
        let state = self.store.lock();
        done(Ok(state.paths.get(&id).map(|stored| stored.path.clone())))
    }

    fn get_by_id_with_nodes(&self, id: PathId) -> StoreFut<'_, Option<LearningPath>> {
        let state = self.store.lock();
        let path = state
            .paths
            .get(&id)
            .map(|stored| stored.path.clone().with_nodes(state.nodes_of(id)));
        done(Ok(path))
    }

    fn get_by_user_id<'a>(&'a self, user_id: &'a str) -> StoreFut<'a, Vec<LearningPath>> {
        let state = self.store.lock();
        let mut owned: Vec<&StoredPath> = state
            .paths
            .values()
            .filter(|stored| stored.path.user_id == user_id)
            .collect();
        owned.sort_by(|a, b| {
            b.path
                .created_at
                .cmp(&a.path.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        done(Ok(owned.into_iter().map(|stored| stored.path.clone()).collect()))
    }

    fn update_status(&self, id: PathId, status: PathStatus) -> StoreFut<'_, ()> {
        done(self.update_status_now(id, status))
    }

    fn transition_status(
        &self,
        id: PathId,
        from: PathStatus,
        to: PathStatus,
    ) -> StoreFut<'_, bool> {
        done(self.transition_now(id, from, to))
    }
}

#[derive(Debug, Clone)]
pub struct MemoryNodeRepository {
    store: MemoryStore,
}

impl MemoryNodeRepository {
    fn create_batch_now(&self, nodes: &[PathNode]) -> Result<(), StoreError> {
        let mut state = self.store.lock();

        // Validate the whole batch before inserting anything.
        let mut ids = Vec::with_capacity(nodes.len());
        let mut slots = Vec::with_capacity(nodes.len());
        for node in nodes {
            if state.nodes.contains_key(&node.id) || ids.contains(&node.id) {
                return Err(StoreError::Conflict(Record::Node(node.id)));
            }
            let slot = (node.path_id, node.position);
            if state.slot_taken(node.path_id, node.position) || slots.contains(&slot) {
                return Err(StoreError::Conflict(Record::Slot {
                    path: node.path_id,
                    position: node.position,
                }));
            }
            if !state.paths.contains_key(&node.path_id) {
                return Err(StoreError::NotFound(Record::Path(node.path_id)));
            }
            ids.push(node.id);
            slots.push(slot);
        }

        for node in nodes {
            state.nodes.insert(node.id, node.clone());
        }
        Ok(())
    }

    fn update_status_now(&self, id: NodeId, status: NodeStatus) -> Result<(), StoreError> {
        let mut state = self.store.lock();
        let node = state
            .nodes
            .get_mut(&id)
            .ok_or(StoreError::NotFound(Record::Node(id)))?;
        *node = node
            .clone()
            .with_status(status)
            .with_timestamps(node.created_at, Utc::now());
        Ok(())
    }

    fn transition_now(
        &self,
        id: NodeId,
        from: NodeStatus,
        to: NodeStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.store.lock();
        let node = state
            .nodes
            .get_mut(&id)
            .ok_or(StoreError::NotFound(Record::Node(id)))?;
        if node.status() != from {
            return Ok(false);
        }
        *node = node
            .clone()
            .with_status(to)
            .with_timestamps(node.created_at, Utc::now());
        Ok(true)
    }

    fn unlock_next_now(&self, path_id: PathId, current: Position) -> bool {
        let Some(next) = current.next() else {
            return false;
        };
        let mut state = self.store.lock();
        let Some(node) = state
            .nodes
            .values_mut()
            .find(|node| node.path_id == path_id && node.position == next)
        else {
            return false;
        };
        if !node.is_locked() {
            return false;
        }
        node.unlock();
        true
    }
}

impl NodeRepository for MemoryNodeRepository {
    fn create_batch<'a>(&'a self, nodes: &'a [PathNode]) -> StoreFut<'a, ()> {
        if nodes.is_empty() {
            return done(Ok(()));
        }
        done(self.create_batch_now(nodes))
    }

    fn get_by_id(&self, id: NodeId) -> StoreFut<'_, Option<PathNode>> {
        let state = self.store.lock();
        done(Ok(state.nodes.get(&id).cloned()))
    }

    fn get_by_path_id(&self, path_id: PathId) -> StoreFut<'_, Vec<PathNode>> {
        let state = self.store.lock();
        done(Ok(state.nodes_of(path_id)))
    }

    fn last_position(&self, path_id: PathId) -> StoreFut<'_, Option<Position>> {
        let state = self.store.lock();
        let last = state
            .nodes
            .values()
            .filter(|node| node.path_id == path_id)
            .map(|node| node.position)
            .max();
        done(Ok(last))
    }

    fn update_status(&self, id: NodeId, status: NodeStatus) -> StoreFut<'_, ()> {
        done(self.update_status_now(id, status))
    }

    fn transition_status(
        &self,
        id: NodeId,
        from: NodeStatus,
        to: NodeStatus,
    ) -> StoreFut<'_, bool> {
        done(self.transition_now(id, from, to))
    }

    fn unlock_next(&self, path_id: PathId, current: Position) -> StoreFut<'_, bool> {
        done(Ok(self.unlock_next_now(path_id, current)))
    }
}
