//! Row encoding shared by the SQLite repositories.
//!
//! Ids are stored as hyphenated UUID text, statuses as their lowercase names
//! and timestamps as fixed-width RFC 3339 UTC text (nanosecond precision), so
//! lexical order on `created_at` is chronological order.

use std::error::Error as StdError;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use pathway_types::{LearningPath, NodeContent, PathNode, Position};
use rusqlite::Row;
use rusqlite::types::Type;

pub(super) const PATH_COLUMNS: &str = "id, user_id, topic, title, status, created_at, updated_at";

pub(super) const NODE_COLUMNS: &str = "id, path_id, position, title, description, markdown_content, \
     boilerplate_code, documentation_snippet, hidden_tests, status, xp_reward, created_at, updated_at";

pub(super) fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(super) fn now() -> String {
    encode_time(&Utc::now())
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn StdError + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|err| conversion_error(idx, err))
}

fn position(row: &Row<'_>, idx: usize) -> rusqlite::Result<Position> {
    let raw: i64 = row.get(idx)?;
    Position::try_from(raw).map_err(|err| conversion_error(idx, err))
}

/// Decode a single nullable position column, e.g. an aggregate over an empty set.
pub(super) fn optional_position(row: &Row<'_>) -> rusqlite::Result<Option<Position>> {
    let raw: Option<i64> = row.get(0)?;
    raw.map(|raw| Position::try_from(raw).map_err(|err| conversion_error(0, err)))
        .transpose()
}

fn xp_reward(row: &Row<'_>, idx: usize) -> rusqlite::Result<u32> {
    let raw: i64 = row.get(idx)?;
    u32::try_from(raw).map_err(|err| conversion_error(idx, err))
}

/// Decode a row selected with [`PATH_COLUMNS`]. Nodes are left unloaded.
pub(super) fn path_from_row(row: &Row<'_>) -> rusqlite::Result<LearningPath> {
    let path = LearningPath::new(
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
    )
    .with_id(parse(row, 0)?)
    .with_status(parse(row, 4)?)
    .with_timestamps(parse(row, 5)?, parse(row, 6)?);
    Ok(path)
}

/// Decode a row selected with [`NODE_COLUMNS`].
pub(super) fn node_from_row(row: &Row<'_>) -> rusqlite::Result<PathNode> {
    let content = NodeContent {
        title: row.get(3)?,
        description: row.get(4)?,
        markdown_content: row.get(5)?,
        boilerplate_code: row.get(6)?,
        documentation_snippet: row.get(7)?,
        hidden_tests: row.get(8)?,
    };
    let node = PathNode::new(parse(row, 1)?, position(row, 2)?, content, xp_reward(row, 10)?)
        .with_id(parse(row, 0)?)
        .with_status(parse(row, 9)?)
        .with_timestamps(parse(row, 11)?, parse(row, 12)?);
    Ok(node)
}
