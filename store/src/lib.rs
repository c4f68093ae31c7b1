//! Persistence for learning paths and their nodes
//!
//! This crate provides:
//! - Object-safe async repository contracts ([`PathRepository`], [`NodeRepository`])
//! - A SQLite adapter with atomic batch inserts and race-free unlocking
//! - An in-memory adapter with the same observable behavior
//!
//! # Architecture
//!
//! ```text
//! Repositories
//! ├── paths: Arc<dyn PathRepository>
//! └── nodes: Arc<dyn NodeRepository>
//!
//! Database (one SQLite connection, blocking pool)
//! ├── SqlitePathRepository
//! └── SqliteNodeRepository
//!
//! MemoryStore (one mutex)
//! ├── MemoryPathRepository
//! └── MemoryNodeRepository
//! ```

mod database;
mod error;
mod memory;
mod repository;
mod sqlite;

pub use database::{Database, DatabaseOptions};
pub use error::{Record, StoreError};
pub use memory::{MemoryNodeRepository, MemoryPathRepository, MemoryStore};
pub use repository::{NodeRepository, PathRepository, Repositories, StoreFut};
pub use sqlite::{SqliteNodeRepository, SqlitePathRepository};
