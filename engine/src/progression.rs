use std::sync::Arc;

use pathway_store::{NodeRepository, PathRepository, Repositories, StoreError};
use pathway_types::{
    LearningPath, NodeId, NodeStatus, PathDraft, PathId, PathNode, PathProgress, PathStatus,
    Position, check_path_shape,
};

use crate::error::{CascadeStep, ProgressionError};

/// Result of a successful node completion (or cascade resume).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub node_id: NodeId,
    pub position: Position,
    /// Position of the node this call unlocked, if it unlocked one.
    pub unlocked_next: Option<Position>,
    /// Whether this call moved the path to `completed`.
    pub path_completed: bool,
}

/// Enforces sequential unlocking on top of the repository contracts.
///
/// Holds no state of its own; every call is a short sequence of repository
/// round trips, so one engine can be shared freely across tasks.
#[derive(Clone)]
pub struct ProgressionEngine {
    paths: Arc<dyn PathRepository>,
    nodes: Arc<dyn NodeRepository>,
}

impl ProgressionEngine {
    #[must_use]
    pub fn new(repositories: Repositories) -> Self {
        Self {
            paths: repositories.paths,
            nodes: repositories.nodes,
        }
    }

    /// Persist a freshly generated path and its initial node set.
    ///
    /// The shape is checked before anything is written. If the node batch
    /// fails, the path row has already been stored and is left in place.
    pub async fn create_path(
        &self,
        path: &LearningPath,
        nodes: &[PathNode],
    ) -> Result<(), ProgressionError> {
        check_path_shape(path, nodes)?;

        self.paths.create(path).await?;
        if let Err(err) = self.nodes.create_batch(nodes).await {
            tracing::warn!(path_id = %path.id, "Path stored without nodes: {err}");
            return Err(err.into());
        }

        tracing::info!(
            path_id = %path.id,
            user_id = %path.user_id,
            nodes = nodes.len(),
            "Created learning path"
        );
        Ok(())
    }

    /// Build entities from a generated draft and persist them.
    ///
    /// Returns the stored path with its nodes loaded.
    pub async fn create_from_draft(
        &self,
        draft: PathDraft,
        user_id: &str,
    ) -> Result<LearningPath, ProgressionError> {
        let (path, nodes) = draft.into_entities(user_id)?;
        self.create_path(&path, &nodes).await?;
        Ok(path.with_nodes(nodes))
    }

    /// Complete an unlocked node, then unlock its successor and, for the last
    /// node, complete the path.
    ///
    /// The three writes are separate store operations. If a later one fails
    /// the node stays completed and [`ProgressionError::CascadeIncomplete`] is
    /// returned; [`ProgressionEngine::resume_cascade`] finishes the job.
    pub async fn complete_node(
        &self,
        path_id: PathId,
        node_id: NodeId,
        position: Position,
    ) -> Result<Completion, ProgressionError> {
        let node = self
            .nodes
            .get_by_id(node_id)
            .await?
            .ok_or(ProgressionError::NodeNotFound(node_id))?;
        if node.path_id != path_id || node.position != position {
            return Err(ProgressionError::NodeMismatch {
                node: node_id,
                path: path_id,
                position,
            });
        }

        let path = self.active_path(path_id).await?;
        if !node.is_unlocked() {
            return Err(ProgressionError::InvalidTransition {
                node: node_id,
                from: node.status(),
            });
        }

        let completed = self
            .nodes
            .transition_status(node_id, NodeStatus::Unlocked, NodeStatus::Completed)
            .await?;
        if !completed {
            // Lost a race with another completion of the same node.
            let from = self
                .nodes
                .get_by_id(node_id)
                .await?
                .map_or(NodeStatus::Completed, |node| node.status());
            return Err(ProgressionError::InvalidTransition {
                node: node_id,
                from,
            });
        }
        tracing::info!(%path_id, %node_id, %position, "Completed node");

        self.cascade(path.id, node_id, position).await
    }

    /// Re-run the unlock and path-completion steps for the completed node at
    /// `position`. Safe to call any number of times.
    pub async fn resume_cascade(
        &self,
        path_id: PathId,
        position: Position,
    ) -> Result<Completion, ProgressionError> {
        let path = self
            .paths
            .get_by_id(path_id)
            .await?
            .ok_or(ProgressionError::PathNotFound(path_id))?;
        if path.status() == PathStatus::Archived {
            return Err(ProgressionError::PathNotActive {
                path: path_id,
                status: path.status(),
            });
        }

        let node = self
            .nodes
            .get_by_path_id(path_id)
            .await?
            .into_iter()
            .find(|node| node.position == position)
            .ok_or(ProgressionError::PositionNotFound {
                path: path_id,
                position,
            })?;
        if !node.is_completed() {
            return Err(ProgressionError::InvalidTransition {
                node: node.id,
                from: node.status(),
            });
        }

        tracing::debug!(%path_id, %position, "Resuming cascade");
        self.cascade(path.id, node.id, position).await
    }

    async fn cascade(
        &self,
        path_id: PathId,
        node_id: NodeId,
        position: Position,
    ) -> Result<Completion, ProgressionError> {
        let incomplete = move |step: CascadeStep| {
            move |source: StoreError| {
                tracing::warn!(%path_id, %node_id, %step, "Cascade incomplete: {source}");
                ProgressionError::CascadeIncomplete {
                    node: node_id,
                    step,
                    source,
                }
            }
        };

        let unlocked = self
            .nodes
            .unlock_next(path_id, position)
            .await
            .map_err(incomplete(CascadeStep::UnlockNext))?;
        let unlocked_next = if unlocked { position.next() } else { None };
        if let Some(next) = unlocked_next {
            tracing::info!(%path_id, position = %next, "Unlocked next node");
        }

        let last = self
            .nodes
            .last_position(path_id)
            .await
            .map_err(incomplete(CascadeStep::CompletePath))?;

        // The path may have been archived since it was read; only an active one completes.
        let path_completed = last == Some(position)
            && self
                .paths
                .transition_status(path_id, PathStatus::Active, PathStatus::Completed)
                .await
                .map_err(incomplete(CascadeStep::CompletePath))?;
        if path_completed {
            tracing::info!(%path_id, "Completed learning path");
        }

        Ok(Completion {
            node_id,
            position,
            unlocked_next,
            path_completed,
        })
    }

    async fn active_path(&self, path_id: PathId) -> Result<LearningPath, ProgressionError> {
        let path = self
            .paths
            .get_by_id(path_id)
            .await?
            .ok_or(ProgressionError::PathNotFound(path_id))?;
        if !path.is_active() {
            return Err(ProgressionError::PathNotActive {
                path: path_id,
                status: path.status(),
            });
        }
        Ok(path)
    }

    pub async fn path_with_nodes(
        &self,
        path_id: PathId,
    ) -> Result<Option<LearningPath>, ProgressionError> {
        Ok(self.paths.get_by_id_with_nodes(path_id).await?)
    }

    /// All paths owned by `user_id`, newest first.
    pub async fn paths_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<LearningPath>, ProgressionError> {
        Ok(self.paths.get_by_user_id(user_id).await?)
    }

    /// The node, if it exists and belongs to `path_id`.
    pub async fn node(
        &self,
        path_id: PathId,
        node_id: NodeId,
    ) -> Result<Option<PathNode>, ProgressionError> {
        let node = self.nodes.get_by_id(node_id).await?;
        Ok(node.filter(|node| node.path_id == path_id))
    }

    pub async fn progress(
        &self,
        path_id: PathId,
    ) -> Result<Option<PathProgress>, ProgressionError> {
        let path = self.paths.get_by_id_with_nodes(path_id).await?;
        Ok(path.and_then(|path| path.progress()))
    }
}
