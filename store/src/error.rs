use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use pathway_types::{NodeId, PathId, Position};
use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

/// The stored record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Path(PathId),
    Node(NodeId),
    /// The `(path_id, position)` slot of a node.
    Slot { path: PathId, position: Position },
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Path(id) => write!(f, "path {id}"),
            Record::Node(id) => write!(f, "node {id}"),
            Record::Slot { path, position } => write!(f, "position {position} of path {path}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(Record),
    #[error("{0} already exists")]
    Conflict(Record),
    #[error("store operation `{operation}` was cancelled")]
    Cancelled { operation: &'static str },
    #[error("store operation `{operation}` exceeded its {timeout:?} deadline")]
    DeadlineExceeded {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("stored {table} row is corrupt: {reason}")]
    Corrupt { table: &'static str, reason: String },
    #[error("store unavailable during `{operation}`")]
    Unavailable {
        operation: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl StoreError {
    /// Whether re-issuing the same operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Cancelled { .. }
                | StoreError::DeadlineExceeded { .. }
                | StoreError::Unavailable { .. }
        )
    }

    pub(crate) fn unavailable(
        operation: &'static str,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        StoreError::Unavailable {
            operation,
            source: source.into(),
        }
    }

    /// Classify a SQLite error that has no record-specific meaning.
    pub(crate) fn sqlite(operation: &'static str, table: &'static str, err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref failure, _)
                if failure.code == ErrorCode::OperationInterrupted =>
            {
                StoreError::Cancelled { operation }
            }
            rusqlite::Error::FromSqlConversionFailure(column, _, source) => StoreError::Corrupt {
                table,
                reason: format!("column {column}: {source}"),
            },
            rusqlite::Error::InvalidColumnType(column, name, kind) => StoreError::Corrupt {
                table,
                reason: format!("column {column} ({name}) has unexpected type {kind}"),
            },
            other => StoreError::unavailable(operation, other),
        }
    }
}

/// Which constraint a failed write tripped, when it was a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Violation {
    PrimaryKey,
    Unique,
    ForeignKey,
}

pub(crate) fn violation(err: &rusqlite::Error) -> Option<Violation> {
    let rusqlite::Error::SqliteFailure(failure, _) = err else {
        return None;
    };
    if failure.code != ErrorCode::ConstraintViolation {
        return None;
    }
    match failure.extended_code {
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Some(Violation::PrimaryKey),
        ffi::SQLITE_CONSTRAINT_UNIQUE => Some(Violation::Unique),
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Violation::ForeignKey),
        _ => None,
    }
}
