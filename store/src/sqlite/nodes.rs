use pathway_types::{NodeId, NodeStatus, PathId, PathNode, Position};
use rusqlite::{OptionalExtension, TransactionBehavior, params};

use super::codec::{NODE_COLUMNS, encode_time, node_from_row, now, optional_position};
use crate::database::Database;
use crate::error::{Violation, violation};
use crate::repository::{NodeRepository, StoreFut};
use crate::{Record, StoreError};

const TABLE: &str = "path_nodes";

#[derive(Debug, Clone)]
pub struct SqliteNodeRepository {
    db: Database,
}

impl SqliteNodeRepository {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// Map a failed insert of `node` to the record it collided with.
fn insert_error(node: &PathNode, err: rusqlite::Error) -> StoreError {
    match violation(&err) {
        Some(Violation::PrimaryKey) => StoreError::Conflict(Record::Node(node.id)),
        Some(Violation::Unique) => StoreError::Conflict(Record::Slot {
            path: node.path_id,
            position: node.position,
        }),
        Some(Violation::ForeignKey) => StoreError::NotFound(Record::Path(node.path_id)),
        None => StoreError::sqlite("nodes.create_batch", TABLE, err),
    }
}

impl NodeRepository for SqliteNodeRepository {
    fn create_batch<'a>(&'a self, nodes: &'a [PathNode]) -> StoreFut<'a, ()> {
        const OP: &str = "nodes.create_batch";
        if nodes.is_empty() {
            return Box::pin(std::future::ready(Ok(())));
        }
        let nodes = nodes.to_vec();
        let count = nodes.len();

        Box::pin(async move {
            self.db
                .run(OP, move |conn| {
                    let map_err = |err| StoreError::sqlite(OP, TABLE, err);
                    let tx = conn
                        .transaction_with_behavior(TransactionBehavior::Immediate)
                        .map_err(map_err)?;
                    {
                        let mut insert = tx
                            .prepare(&format!(
                                "INSERT INTO path_nodes ({NODE_COLUMNS})
                                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                            ))
                            .map_err(map_err)?;
                        for node in &nodes {
                            insert
                                .execute(params![
                                    node.id.to_string(),
                                    node.path_id.to_string(),
                                    i64::from(node.position.value()),
                                    node.content.title,
                                    node.content.description,
                                    node.content.markdown_content,
                                    node.content.boilerplate_code,
                                    node.content.documentation_snippet,
                                    node.content.hidden_tests,
                                    node.status().as_str(),
                                    i64::from(node.xp_reward),
                                    encode_time(&node.created_at),
                                    encode_time(&node.updated_at),
                                ])
                                .map_err(|err| insert_error(node, err))?;
                        }
                    }
                    // Any early return above drops `tx`, rolling the whole batch back.
                    tx.commit().map_err(map_err)
                })
                .await?;
            tracing::debug!(count, "Stored path nodes");
            Ok(())
        })
    }

    fn get_by_id(&self, id: NodeId) -> StoreFut<'_, Option<PathNode>> {
        Box::pin(self.db.run("nodes.get_by_id", move |conn| {
            conn.query_row(
                &format!("SELECT {NODE_COLUMNS} FROM path_nodes WHERE id = ?1"),
                params![id.to_string()],
                node_from_row,
            )
            .optional()
            .map_err(|err| StoreError::sqlite("nodes.get_by_id", TABLE, err))
        }))
    }

    fn get_by_path_id(&self, path_id: PathId) -> StoreFut<'_, Vec<PathNode>> {
        Box::pin(self.db.run("nodes.get_by_path_id", move |conn| {
            let map_err = |err| StoreError::sqlite("nodes.get_by_path_id", TABLE, err);
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {NODE_COLUMNS} FROM path_nodes
                     WHERE path_id = ?1 ORDER BY position ASC"
                ))
                .map_err(map_err)?;
            let nodes = stmt
                .query_map(params![path_id.to_string()], node_from_row)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(map_err)?;
            Ok(nodes)
        }))
    }

    fn last_position(&self, path_id: PathId) -> StoreFut<'_, Option<Position>> {
        Box::pin(self.db.run("nodes.last_position", move |conn| {
            conn.query_row(
                "SELECT MAX(position) FROM path_nodes WHERE path_id = ?1",
                params![path_id.to_string()],
                optional_position,
            )
            .map_err(|err| StoreError::sqlite("nodes.last_position", TABLE, err))
        }))
    }

    fn update_status(&self, id: NodeId, status: NodeStatus) -> StoreFut<'_, ()> {
        Box::pin(self.db.run("nodes.update_status", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE path_nodes SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status.as_str(), now(), id.to_string()],
                )
                .map_err(|err| StoreError::sqlite("nodes.update_status", TABLE, err))?;
            if changed == 0 {
                return Err(StoreError::NotFound(Record::Node(id)));
            }
            tracing::debug!(node_id = %id, %status, "Updated node status");
            Ok(())
        }))
    }

    fn transition_status(
        &self,
        id: NodeId,
        from: NodeStatus,
        to: NodeStatus,
    ) -> StoreFut<'_, bool> {
        const OP: &str = "nodes.transition_status";
        Box::pin(self.db.run(OP, move |conn| {
            let map_err = |err| StoreError::sqlite(OP, TABLE, err);
            let key = id.to_string();
            let changed = conn
                .execute(
                    "UPDATE path_nodes SET status = ?1, updated_at = ?2
                     WHERE id = ?3 AND status = ?4",
                    params![to.as_str(), now(), key, from.as_str()],
                )
                .map_err(map_err)?;
            if changed == 1 {
                tracing::debug!(node_id = %id, %from, %to, "Transitioned node status");
                return Ok(true);
            }

            let exists = conn
                .query_row("SELECT 1 FROM path_nodes WHERE id = ?1", params![key], |_| {
                    Ok(())
                })
                .optional()
                .map_err(map_err)?
                .is_some();
            if exists {
                Ok(false)
            } else {
                Err(StoreError::NotFound(Record::Node(id)))
            }
        }))
    }

    fn unlock_next(&self, path_id: PathId, current: Position) -> StoreFut<'_, bool> {
        let Some(next) = current.next() else {
            return Box::pin(std::future::ready(Ok(false)));
        };
        Box::pin(self.db.run("nodes.unlock_next", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE path_nodes SET status = ?1, updated_at = ?2
                     WHERE path_id = ?3 AND position = ?4 AND status = ?5",
                    params![
                        NodeStatus::Unlocked.as_str(),
                        now(),
                        path_id.to_string(),
                        i64::from(next.value()),
                        NodeStatus::Locked.as_str(),
                    ],
                )
                .map_err(|err| StoreError::sqlite("nodes.unlock_next", TABLE, err))?;
            if changed == 1 {
                tracing::debug!(%path_id, position = %next, "Unlocked next node");
            }
            Ok(changed == 1)
        }))
    }
}
