use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{PathId, PathNode, PathStatus};

/// An ordered learning plan owned by one user.
///
/// `nodes` is loaded on demand: `None` means the nodes were not requested,
/// `Some(vec![])` means they were loaded and there are none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearningPath {
    pub id: PathId,
    pub user_id: String,
    pub topic: String,
    pub title: String,
    status: PathStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nodes: Option<Vec<PathNode>>,
}

impl LearningPath {
    /// A fresh `active` path with a new id and no nodes loaded.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        topic: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PathId::new(),
            user_id: user_id.into(),
            topic: topic.into(),
            title: title.into(),
            status: PathStatus::Active,
            created_at: now,
            updated_at: now,
            nodes: None,
        }
    }

    pub fn with_id(mut self, id: PathId) -> Self {
        self.id = id;
        self
    }

    /// Set the status directly. Used when rehydrating persisted rows.
    pub fn with_status(mut self, status: PathStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Attach a loaded node list. Nodes are kept sorted by position.
    pub fn with_nodes(mut self, mut nodes: Vec<PathNode>) -> Self {
        nodes.sort_by_key(|node| node.position);
        self.nodes = Some(nodes);
        self
    }

    #[must_use]
    pub fn status(&self) -> PathStatus {
        self.status
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PathStatus::Active
    }

    /// `active → completed`. Paths in any other state are left alone.
    pub fn mark_completed(&mut self) {
        if self.status == PathStatus::Active {
            self.status = PathStatus::Completed;
            self.updated_at = Utc::now();
        }
    }

    #[must_use]
    pub fn nodes(&self) -> Option<&[PathNode]> {
        self.nodes.as_deref()
    }

    #[must_use]
    pub fn take_nodes(&mut self) -> Option<Vec<PathNode>> {
        self.nodes.take()
    }

    /// Progress summary, if nodes are loaded.
    #[must_use]
    pub fn progress(&self) -> Option<PathProgress> {
        self.nodes().map(PathProgress::from_nodes)
    }
}

/// Derived completion summary for a path's node set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PathProgress {
    pub total_nodes: usize,
    pub completed_nodes: usize,
    pub xp_earned: u64,
    pub xp_available: u64,
    /// The lowest-position node currently open for work.
    pub current: Option<crate::NodeId>,
}

impl PathProgress {
    #[must_use]
    pub fn from_nodes(nodes: &[PathNode]) -> Self {
        let mut progress = Self {
            total_nodes: nodes.len(),
            completed_nodes: 0,
            xp_earned: 0,
            xp_available: 0,
            current: None,
        };
        let mut current_position = None;
        for node in nodes {
            progress.xp_available += u64::from(node.xp_reward);
            if node.is_completed() {
                progress.completed_nodes += 1;
                progress.xp_earned += u64::from(node.xp_reward);
            } else if node.is_unlocked()
                && current_position.is_none_or(|position| node.position < position)
            {
                current_position = Some(node.position);
                progress.current = Some(node.id);
            }
        }
        progress
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.total_nodes > 0 && self.completed_nodes == self.total_nodes
    }
}
