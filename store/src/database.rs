//! SQLite database handle shared by the repository adapters.
//!
//! A [`Database`] owns one connection behind a mutex. Each repository call
//! checks the connection out for exactly one operation on tokio's blocking
//! pool and returns it when the guard drops, on every exit path.
//!
//! # Cancellation
//!
//! Every call installs a SQLite progress handler for its duration. The
//! handler aborts the running statement once the caller's future has been
//! dropped or the configured operation deadline has passed. An aborted
//! statement fails with `SQLITE_INTERRUPT`; any transaction open at that point
//! is rolled back when its guard drops, so no half-applied write survives.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::StoreError;

/// Virtual machine instructions between cancellation checks.
const PROGRESS_CHECK_OPS: i32 = 1_000;

pub(crate) const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS learning_paths (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        topic TEXT NOT NULL,
        title TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active'
            CHECK (status IN ('active', 'completed', 'archived')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_learning_paths_user
    ON learning_paths(user_id, created_at);

    CREATE TABLE IF NOT EXISTS path_nodes (
        id TEXT PRIMARY KEY NOT NULL,
        path_id TEXT NOT NULL REFERENCES learning_paths(id),
        position INTEGER NOT NULL CHECK (position >= 1),
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        markdown_content TEXT NOT NULL,
        boilerplate_code TEXT NOT NULL,
        documentation_snippet TEXT NOT NULL,
        hidden_tests TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'locked'
            CHECK (status IN ('locked', 'unlocked', 'completed')),
        xp_reward INTEGER NOT NULL DEFAULT 100,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (path_id, position)
    );
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// How long a statement waits on a lock held by another connection.
    pub busy_timeout: Duration,
    /// Upper bound on a single repository operation, including the wait for
    /// the connection. `None` means only caller cancellation applies.
    pub operation_timeout: Option<Duration>,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            operation_timeout: None,
        }
    }
}

/// Cloneable handle to one SQLite database.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

struct Inner {
    conn: Mutex<Connection>,
    options: DatabaseOptions,
    location: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.inner.location)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open or create a database file at `path`, creating the schema if needed.
    pub fn open(path: impl AsRef<Path>, options: DatabaseOptions) -> Result<Self, StoreError> {
        let path = path.as_ref();
        prepare_db_path(path).map_err(|err| StoreError::unavailable("open", err))?;

        let conn = Connection::open(path).map_err(|err| StoreError::unavailable("open", err))?;
        let db = Self::initialize(conn, options, path.display().to_string())?;
        tracing::debug!(path = %path.display(), "Opened learning path database");
        Ok(db)
    }

    /// Open a private in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open_in_memory_with(DatabaseOptions::default())
    }

    pub fn open_in_memory_with(options: DatabaseOptions) -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|err| StoreError::unavailable("open", err))?;
        Self::initialize(conn, options, ":memory:".to_owned())
    }

    fn initialize(
        conn: Connection,
        options: DatabaseOptions,
        location: String,
    ) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;",
        )
        .map_err(|err| StoreError::unavailable("pragmas", err))?;
        conn.busy_timeout(options.busy_timeout)
            .map_err(|err| StoreError::unavailable("pragmas", err))?;
        conn.execute_batch(SCHEMA)
            .map_err(|err| StoreError::unavailable("schema", err))?;

        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                options,
                location,
            }),
        })
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.inner.location
    }

    #[must_use]
    pub fn options(&self) -> DatabaseOptions {
        self.inner.options
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// `f` must do all of its work through the given connection and map its
    /// own SQLite errors; interrupts surface as [`StoreError::Cancelled`] and
    /// are upgraded to [`StoreError::DeadlineExceeded`] here when the deadline
    /// is what fired.
    pub(crate) async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let timeout = self.inner.options.operation_timeout;
        let abort = Abort {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: timeout.map(|timeout| Instant::now() + timeout),
        };
        let mut guard = CancelOnDrop {
            cancelled: Arc::clone(&abort.cancelled),
            armed: true,
        };
        let inner = Arc::clone(&self.inner);

        let task = tokio::task::spawn_blocking(move || {
            let mut conn = inner.conn.lock().unwrap_or_else(PoisonError::into_inner);
            if abort.fired() {
                return Err(abort.error(operation, timeout));
            }

            let handler = abort.clone();
            conn.progress_handler(PROGRESS_CHECK_OPS, Some(move || handler.fired()))
                .map_err(|err| StoreError::sqlite(operation, "connection", err))?;
            let result = f(&mut *conn);
            let cleared = conn
                .progress_handler(PROGRESS_CHECK_OPS, None::<fn() -> bool>)
                .map_err(|err| StoreError::sqlite(operation, "connection", err));

            let value = result.map_err(|err| match err {
                StoreError::Cancelled { .. } => abort.error(operation, timeout),
                other => other,
            })?;
            cleared.map(|()| value)
        });

        let result = task
            .await
            .map_err(|err| StoreError::unavailable(operation, err))?;
        guard.armed = false;

        if let Err(err) = &result
            && err.is_retryable()
        {
            tracing::warn!(operation, location = %self.inner.location, "Store operation failed: {err}");
        }
        result
    }
}

/// Shared abort condition checked by the progress handler.
#[derive(Clone)]
struct Abort {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Abort {
    fn deadline_passed(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn fired(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.deadline_passed()
    }

    fn error(&self, operation: &'static str, timeout: Option<Duration>) -> StoreError {
        match timeout {
            Some(timeout) if self.deadline_passed() => StoreError::DeadlineExceeded {
                operation,
                timeout,
            },
            _ => StoreError::Cancelled { operation },
        }
    }
}

/// Marks the operation cancelled if its future is dropped before completion.
struct CancelOnDrop {
    cancelled: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.store(true, Ordering::Release);
        }
    }
}

// ── Secure file preparation ─────────────────────────────────

/// Create the parent directory (0o700) and the database file (0o600).
fn prepare_db_path(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_secure_dir(parent)?;
    }
    ensure_secure_db_file(path)
}

fn ensure_secure_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};

        let metadata = std::fs::metadata(path)?;
        let our_uid = unsafe { libc::getuid() };
        if metadata.uid() != our_uid {
            return Ok(());
        }

        let current_mode = metadata.permissions().mode() & 0o777;
        if current_mode & 0o077 != 0 {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
        }
    }
    Ok(())
}

fn ensure_secure_db_file(path: &Path) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.create(true).truncate(false).read(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let _file = options.open(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        for suffix in ["-wal", "-shm"] {
            let sidecar = sidecar_path(path, suffix);
            if sidecar.exists() {
                let _ = std::fs::set_permissions(&sidecar, std::fs::Permissions::from_mode(0o600));
            }
        }
    }
    Ok(())
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
