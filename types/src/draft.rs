//! Generated path drafts and the shape rules a new path must satisfy.
//!
//! A content generator hands over a [`PathDraft`]; [`PathDraft::into_entities`]
//! turns it into one path plus its nodes with positions `1..=N`, the first
//! node `unlocked` and every later node `locked`. [`check_path_shape`] verifies
//! the same rules for entities built any other way.

use serde::Deserialize;
use thiserror::Error;

use crate::{
    DEFAULT_XP_REWARD, LearningPath, NodeContent, NodeId, NodeStatus, NonEmptyString, PathId,
    PathNode, PathStatus, Position,
};

fn default_xp_reward() -> u32 {
    DEFAULT_XP_REWARD
}

/// One generated exercise, in order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeDraft {
    #[serde(flatten)]
    pub content: NodeContent,
    #[serde(default = "default_xp_reward")]
    pub xp_reward: u32,
}

/// A generated learning path awaiting persistence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathDraft {
    pub topic: NonEmptyString,
    pub title: NonEmptyString,
    pub nodes: Vec<NodeDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathShapeError {
    #[error("path {path} has no nodes")]
    NoNodes { path: PathId },
    #[error("path {path} is {status}; new paths must be active")]
    PathNotActive { path: PathId, status: PathStatus },
    #[error("node {node} belongs to path {found}, expected {expected}")]
    ForeignNode {
        node: NodeId,
        expected: PathId,
        found: PathId,
    },
    #[error("node {node} is at position {found}, expected {expected}")]
    PositionGap {
        node: NodeId,
        expected: u32,
        found: Position,
    },
    #[error("first node {node} must be unlocked, found {status}")]
    FirstNotUnlocked { node: NodeId, status: NodeStatus },
    #[error("node {node} at position {position} must start locked, found {status}")]
    LaterNotLocked {
        node: NodeId,
        position: Position,
        status: NodeStatus,
    },
    #[error("path has more nodes than positions can address")]
    TooManyNodes,
}

impl PathDraft {
    /// Build the path and its initial node set for `user_id`.
    pub fn into_entities(
        self,
        user_id: impl Into<String>,
    ) -> Result<(LearningPath, Vec<PathNode>), PathShapeError> {
        let path = LearningPath::new(user_id, self.topic, self.title);
        if self.nodes.is_empty() {
            return Err(PathShapeError::NoNodes { path: path.id });
        }

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (index, draft) in self.nodes.into_iter().enumerate() {
            let position =
                Position::try_from(index + 1).map_err(|_err| PathShapeError::TooManyNodes)?;
            let status = if position.is_first() {
                NodeStatus::Unlocked
            } else {
                NodeStatus::Locked
            };
            let node = PathNode::new(path.id, position, draft.content, draft.xp_reward)
                .with_status(status)
                .with_timestamps(path.created_at, path.created_at);
            nodes.push(node);
        }

        Ok((path, nodes))
    }
}

/// Verify that `nodes` is a well-formed initial node set for `path`.
///
/// Nodes must be given in position order.
pub fn check_path_shape(path: &LearningPath, nodes: &[PathNode]) -> Result<(), PathShapeError> {
    if !path.is_active() {
        return Err(PathShapeError::PathNotActive {
            path: path.id,
            status: path.status(),
        });
    }
    if nodes.is_empty() {
        return Err(PathShapeError::NoNodes { path: path.id });
    }

    for (index, node) in nodes.iter().enumerate() {
        if node.path_id != path.id {
            return Err(PathShapeError::ForeignNode {
                node: node.id,
                expected: path.id,
                found: node.path_id,
            });
        }

        let expected = u32::try_from(index + 1).map_err(|_err| PathShapeError::TooManyNodes)?;
        if node.position.value() != expected {
            return Err(PathShapeError::PositionGap {
                node: node.id,
                expected,
                found: node.position,
            });
        }

        if node.position.is_first() {
            if !node.is_unlocked() {
                return Err(PathShapeError::FirstNotUnlocked {
                    node: node.id,
                    status: node.status(),
                });
            }
        } else if !node.is_locked() {
            return Err(PathShapeError::LaterNotLocked {
                node: node.id,
                position: node.position,
                status: node.status(),
            });
        }
    }

    Ok(())
}
