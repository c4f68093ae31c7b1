use pathway_types::{LearningPath, PathId, PathStatus};
use rusqlite::{OptionalExtension, params};

use super::codec::{NODE_COLUMNS, PATH_COLUMNS, encode_time, node_from_row, now, path_from_row};
use crate::database::Database;
use crate::error::{Violation, violation};
use crate::repository::{PathRepository, StoreFut};
use crate::{Record, StoreError};

const TABLE: &str = "learning_paths";

#[derive(Debug, Clone)]
pub struct SqlitePathRepository {
    db: Database,
}

impl SqlitePathRepository {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl PathRepository for SqlitePathRepository {
    fn create<'a>(&'a self, path: &'a LearningPath) -> StoreFut<'a, ()> {
        let id = path.id;
        let values = (
            path.id.to_string(),
            path.user_id.clone(),
            path.topic.clone(),
            path.title.clone(),
            path.status().as_str(),
            encode_time(&path.created_at),
            encode_time(&path.updated_at),
        );
        Box::pin(async move {
            self.db
                .run("paths.create", move |conn| {
                    let (path_id, user_id, topic, title, status, created_at, updated_at) = values;
                    conn.execute(
                        "INSERT INTO learning_paths
                         (id, user_id, topic, title, status, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![path_id, user_id, topic, title, status, created_at, updated_at],
                    )
                    .map_err(|err| match violation(&err) {
                        Some(Violation::PrimaryKey) => StoreError::Conflict(Record::Path(id)),
                        _ => StoreError::sqlite("paths.create", TABLE, err),
                    })?;
                    Ok(())
                })
                .await?;
            tracing::debug!(path_id = %id, "Stored learning path");
            Ok(())
        })
    }

    fn get_by_id(&self, id: PathId) -> StoreFut<'_, Option<LearningPath>> {
        Box::pin(self.db.run("paths.get_by_id", move |conn| {
            conn.query_row(
                &format!("SELECT {PATH_COLUMNS} FROM learning_paths WHERE id = ?1"),
                params![id.to_string()],
                path_from_row,
            )
            .optional()
            .map_err(|err| StoreError::sqlite("paths.get_by_id", TABLE, err))
        }))
    }

    fn get_by_id_with_nodes(&self, id: PathId) -> StoreFut<'_, Option<LearningPath>> {
        const OP: &str = "paths.get_by_id_with_nodes";
        Box::pin(self.db.run(OP, move |conn| {
            let map_err = |err| StoreError::sqlite(OP, TABLE, err);
            // One read transaction so the path and its nodes are a consistent snapshot.
            let tx = conn.transaction().map_err(map_err)?;
            let key = id.to_string();

            let Some(path) = tx
                .query_row(
                    &format!("SELECT {PATH_COLUMNS} FROM learning_paths WHERE id = ?1"),
                    params![key],
                    path_from_row,
                )
                .optional()
                .map_err(map_err)?
            else {
                return Ok(None);
            };

            let nodes = {
                let mut stmt = tx
                    .prepare(&format!(
                        "SELECT {NODE_COLUMNS} FROM path_nodes
                         WHERE path_id = ?1 ORDER BY position ASC"
                    ))
                    .map_err(map_err)?;
                stmt.query_map(params![key], node_from_row)
                    .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                    .map_err(|err| StoreError::sqlite(OP, "path_nodes", err))?
            };
            tx.commit().map_err(map_err)?;

            Ok(Some(path.with_nodes(nodes)))
        }))
    }

    fn get_by_user_id<'a>(&'a self, user_id: &'a str) -> StoreFut<'a, Vec<LearningPath>> {
        let user_id = user_id.to_owned();
        Box::pin(self.db.run("paths.get_by_user_id", move |conn| {
            let map_err = |err| StoreError::sqlite("paths.get_by_user_id", TABLE, err);
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {PATH_COLUMNS} FROM learning_paths
                     WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC"
                ))
                .map_err(map_err)?;
            let paths = stmt
                .query_map(params![user_id], path_from_row)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(map_err)?;
            Ok(paths)
        }))
    }

    fn update_status(&self, id: PathId, status: PathStatus) -> StoreFut<'_, ()> {
        Box::pin(self.db.run("paths.update_status", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE learning_paths SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status.as_str(), now(), id.to_string()],
                )
                .map_err(|err| StoreError::sqlite("paths.update_status", TABLE, err))?;
            if changed == 0 {
                return Err(StoreError::NotFound(Record::Path(id)));
            }
            tracing::debug!(path_id = %id, %status, "Updated path status");
            Ok(())
        }))
    }

    fn transition_status(
        &self,
        id: PathId,
        from: PathStatus,
        to: PathStatus,
    ) -> StoreFut<'_, bool> {
        const OP: &str = "paths.transition_status";
        Box::pin(self.db.run(OP, move |conn| {
            let map_err = |err| StoreError::sqlite(OP, TABLE, err);
            let key = id.to_string();
            let changed = conn
                .execute(
                    "UPDATE learning_paths SET status = ?1, updated_at = ?2
                     WHERE id = ?3 AND status = ?4",
                    params![to.as_str(), now(), key, from.as_str()],
                )
                .map_err(map_err)?;
            if changed == 1 {
                tracing::debug!(path_id = %id, %from, %to, "Transitioned path status");
                return Ok(true);
            }

            let exists = conn
                .query_row(
                    "SELECT 1 FROM learning_paths WHERE id = ?1",
                    params![key],
                    |_| Ok(()),
                )
                .optional()
                .map_err(map_err)?
                .is_some();
            if exists {
                Ok(false)
            } else {
                Err(StoreError::NotFound(Record::Path(id)))
            }
        }))
    }
}
