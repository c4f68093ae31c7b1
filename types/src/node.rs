use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{NodeId, NodeStatus, PathId, Position};

/// Points granted for completing a node when the generator does not say.
pub const DEFAULT_XP_REWARD: u32 = 100;

/// Exercise content of a node. Immutable once the node is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub markdown_content: String,
    #[serde(default)]
    pub boilerplate_code: String,
    #[serde(default)]
    pub documentation_snippet: String,
    /// Serialized hidden test specification (typically JSON); opaque here.
    #[serde(default)]
    pub hidden_tests: String,
}

/// A single exercise within a learning path.
///
/// `status` is private: it only moves forward through [`PathNode::unlock`]
/// and [`PathNode::complete`], both of which are no-ops when the node is not
/// in the expected source state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathNode {
    pub id: NodeId,
    pub path_id: PathId,
    pub position: Position,
    #[serde(flatten)]
    pub content: NodeContent,
    status: NodeStatus,
    pub xp_reward: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PathNode {
    /// A fresh `locked` node with a new id.
    #[must_use]
    pub fn new(path_id: PathId, position: Position, content: NodeContent, xp_reward: u32) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::new(),
            path_id,
            position,
            content,
            status: NodeStatus::Locked,
            xp_reward,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Set the status directly. Used when constructing the initial node set
    /// and when rehydrating persisted rows.
    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.content.title
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.status == NodeStatus::Locked
    }

    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.status == NodeStatus::Unlocked
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == NodeStatus::Completed
    }

    /// `locked → unlocked`. Idempotent; any other source state is left alone.
    pub fn unlock(&mut self) {
        if self.status == NodeStatus::Locked {
            self.status = NodeStatus::Unlocked;
            self.updated_at = Utc::now();
        }
    }

    /// `unlocked → completed`. Locked or already completed nodes are left alone.
    pub fn complete(&mut self) {
        if self.status == NodeStatus::Unlocked {
            self.status = NodeStatus::Completed;
            self.updated_at = Utc::now();
        }
    }
}
