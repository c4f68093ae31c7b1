//! Core domain types for Pathway.
//!
//! This crate contains the learning-path entities and their transition rules
//! with no IO, no async, and minimal dependencies. Everything here can be used
//! from any layer of the application.
//!
//! # Progression invariants
//!
//! - Nodes of a path are totally ordered by [`Position`], assigned `1..=N`.
//! - A node only moves `locked → unlocked → completed`; nothing reverses.
//! - A path only moves `active → completed` (or `active → archived`).
//!
//! The entity helpers here are guards, not validators: an illegal transition
//! is a no-op and callers inspect the resulting status when they need to tell
//! "already completed" from "just completed".

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod draft;
mod ids;
mod node;
mod path;
mod status;

pub use draft::{NodeDraft, PathDraft, PathShapeError, check_path_shape};
pub use ids::{InvalidId, InvalidPosition, NodeId, PathId, Position};
pub use node::{DEFAULT_XP_REWARD, NodeContent, PathNode};
pub use path::{LearningPath, PathProgress};
pub use status::{NodeStatus, PathStatus, UnknownStatus};

use serde::Deserialize;
use thiserror::Error;

/// Draft text that must carry something besides whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Error)]
#[error("value must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(EmptyStringError);
        }
        Ok(Self(value))
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}
