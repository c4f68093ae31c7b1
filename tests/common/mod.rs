//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use pathway_engine::{ProgressionEngine, Repositories};
use pathway_store::{Database, DatabaseOptions};
use pathway_types::{LearningPath, PathDraft, PathNode, Position};
use tempfile::TempDir;

/// A file-backed database in its own temporary directory.
pub struct TestDb {
    dir: TempDir,
    path: PathBuf,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("data").join("pathway.db");
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn open(&self) -> Database {
        self.open_with(DatabaseOptions::default())
    }

    pub fn open_with(&self, options: DatabaseOptions) -> Database {
        Database::open(&self.path, options).expect("open test database")
    }

    pub fn engine(&self) -> ProgressionEngine {
        ProgressionEngine::new(Repositories::sqlite(&self.open()))
    }
}

pub fn draft_json(node_count: usize) -> serde_json::Value {
    let nodes: Vec<serde_json::Value> = (1..=node_count)
        .map(|i| {
            serde_json::json!({
                "title": format!("Exercise {i}"),
                "description": format!("Step {i} of {node_count}"),
                "markdown_content": "## Task\nMake the tests pass.",
                "boilerplate_code": "package main\n\nfunc main() {}\n",
                "documentation_snippet": "https://go.dev/doc/",
                "hidden_tests": "{\"cases\":[{\"input\":\"\",\"expected\":\"ok\"}]}",
            })
        })
        .collect();
    serde_json::json!({
        "topic": "Learn Go basics",
        "title": "Go Fundamentals",
        "nodes": nodes,
    })
}

pub fn draft(node_count: usize) -> PathDraft {
    serde_json::from_value(draft_json(node_count)).expect("valid draft")
}

pub fn pos(value: u32) -> Position {
    Position::try_new(value).expect("non-zero position")
}

pub fn node_at(path: &LearningPath, position: u32) -> &PathNode {
    path.nodes()
        .and_then(|nodes| nodes.iter().find(|node| node.position == pos(position)))
        .expect("node at position")
}
