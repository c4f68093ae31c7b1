use std::fmt;

use pathway_store::{Record, StoreError};
use pathway_types::{NodeId, NodeStatus, PathId, PathShapeError, PathStatus, Position};
use thiserror::Error;

/// The cascade step that failed after a node was already completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    UnlockNext,
    CompletePath,
}

impl fmt::Display for CascadeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CascadeStep::UnlockNext => f.write_str("unlock next node"),
            CascadeStep::CompletePath => f.write_str("complete path"),
        }
    }
}

/// Coarse failure class for transport-level status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidTransition,
    InvalidInput,
    StoreUnavailable,
}

#[derive(Debug, Error)]
pub enum ProgressionError {
    #[error("Path {0} not found")]
    PathNotFound(PathId),
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),
    #[error("Path {path} has no node at position {position}")]
    PositionNotFound { path: PathId, position: Position },
    #[error("Node {node} is not at position {position} of path {path}")]
    NodeMismatch {
        node: NodeId,
        path: PathId,
        position: Position,
    },
    #[error("Path {path} is {status}, not active")]
    PathNotActive { path: PathId, status: PathStatus },
    #[error("Node {node} cannot be completed from {from}")]
    InvalidTransition { node: NodeId, from: NodeStatus },
    #[error("Malformed path: {0}")]
    MalformedPath(#[from] PathShapeError),
    #[error("Conflict: {0} already exists")]
    Conflict(Record),
    /// The node is completed but a later step did not run. Recover with
    /// `ProgressionEngine::resume_cascade`.
    #[error("Node {node} was completed but the cascade failed to {step}")]
    CascadeIncomplete {
        node: NodeId,
        step: CascadeStep,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl ProgressionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProgressionError::PathNotFound(_)
            | ProgressionError::NodeNotFound(_)
            | ProgressionError::PositionNotFound { .. } => ErrorKind::NotFound,
            ProgressionError::Conflict(_) => ErrorKind::Conflict,
            ProgressionError::InvalidTransition { .. } | ProgressionError::PathNotActive { .. } => {
                ErrorKind::InvalidTransition
            }
            ProgressionError::NodeMismatch { .. } | ProgressionError::MalformedPath(_) => {
                ErrorKind::InvalidInput
            }
            ProgressionError::CascadeIncomplete { .. } | ProgressionError::Store(_) => {
                ErrorKind::StoreUnavailable
            }
        }
    }

    /// Whether retrying (or resuming) can make progress.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ProgressionError::CascadeIncomplete { .. } => true,
            ProgressionError::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<StoreError> for ProgressionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(record) => ProgressionError::Conflict(record),
            StoreError::NotFound(Record::Path(id)) => ProgressionError::PathNotFound(id),
            StoreError::NotFound(Record::Node(id)) => ProgressionError::NodeNotFound(id),
            StoreError::NotFound(Record::Slot { path, position }) => {
                ProgressionError::PositionNotFound { path, position }
            }
            other => ProgressionError::Store(other),
        }
    }
}
