//! Configuration loading for Pathway.
//!
//! Reads `~/.pathway/config.toml`. Every section is optional and a missing
//! file is not an error; callers fall back to the defaults exposed here.
//!
//! ```toml
//! [app]
//! default_user = "anonymous"
//!
//! [store]
//! path = "${HOME}/.pathway/pathway.db"
//! busy_timeout_ms = 5000
//! operation_timeout_ms = 10000
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Owner of paths created without an explicit user.
pub const DEFAULT_USER: &str = "anonymous";

/// Environment variable that overrides the configured database path.
pub const DB_PATH_ENV: &str = "PATHWAY_DB";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Deserialize)]
pub struct PathwayConfig {
    pub app: Option<AppConfig>,
    pub store: Option<StoreConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub default_user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    /// Database file. `${VAR}` references are expanded.
    pub path: Option<String>,
    pub busy_timeout_ms: Option<u64>,
    /// Upper bound on a single store operation. Unset means no bound.
    pub operation_timeout_ms: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config at {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Replace `${VAR}` with the value of `VAR` (empty if unset).
///
/// An unterminated `${` is kept as written.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        if !name.is_empty() {
            out.push_str(&env::var(name).unwrap_or_default());
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

impl PathwayConfig {
    /// Load the user's config file. `Ok(None)` if there is none.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {}: {source}", path.display());
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map(Some).map_err(|source| {
            tracing::warn!("Failed to parse config at {}: {source}", path.display());
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn default_user(&self) -> String {
        self.app
            .as_ref()
            .and_then(|app| app.default_user.as_deref())
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .unwrap_or(DEFAULT_USER)
            .to_owned()
    }

    /// Database file, honoring `PATHWAY_DB` over the config file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        let env_override = env::var(DB_PATH_ENV).ok();
        self.database_path_with(env_override.as_deref())
    }

    fn database_path_with(&self, env_override: Option<&str>) -> PathBuf {
        if let Some(path) = env_override.filter(|path| !path.trim().is_empty()) {
            return PathBuf::from(path);
        }
        self.store
            .as_ref()
            .and_then(|store| store.path.as_deref())
            .map(expand_env_vars)
            .filter(|path| !path.trim().is_empty())
            .map_or_else(default_database_path, PathBuf::from)
    }

    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        self.store
            .as_ref()
            .and_then(|store| store.busy_timeout_ms)
            .map_or(DEFAULT_BUSY_TIMEOUT, Duration::from_millis)
    }

    #[must_use]
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.store
            .as_ref()
            .and_then(|store| store.operation_timeout_ms)
            .map(Duration::from_millis)
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pathway").join("config.toml"))
}

fn default_database_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pathway")
        .join("pathway.db")
}
