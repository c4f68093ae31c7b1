//! Progression engine for Pathway - sequential unlock orchestration.
//!
//! This crate composes the entity rules from `pathway-types` with the
//! repository contracts from `pathway-store`. It has no storage or transport
//! dependencies of its own; callers inject a [`Repositories`] bundle.
//!
//! Completing node *k* of a path is three separate store operations:
//!
//! 1. compare-and-set node *k* from `unlocked` to `completed`
//! 2. unlock node *k + 1* if it is still `locked`
//! 3. if *k* is the last position, mark the path `completed`
//!
//! Step 1 decides who wins a race. Steps 2 and 3 are idempotent, so a failure
//! after step 1 is repaired by [`ProgressionEngine::resume_cascade`].

mod error;
mod progression;

pub use error::{CascadeStep, ErrorKind, ProgressionError};
pub use progression::{Completion, ProgressionEngine};

pub use pathway_store::Repositories;

#[cfg(test)]
mod tests;
