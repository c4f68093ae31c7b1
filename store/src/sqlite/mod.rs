//! SQLite implementations of the repository contracts.

mod codec;
mod nodes;
mod paths;

pub use nodes::SqliteNodeRepository;
pub use paths::SqlitePathRepository;
