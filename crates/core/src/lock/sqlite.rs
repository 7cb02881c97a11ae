//! SQLite-backed lock backend.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{LockError, TaskLock};

/// Lock entries in the `cache_locks` table.
///
/// Several processes pointing at the same database file share the locks.
pub struct SqliteTaskLock {
    conn: Mutex<Connection>,
}

impl SqliteTaskLock {
    /// Open (or create) the lock table in the database at `path`.
    pub fn new(path: &Path) -> Result<Self, LockError> {
        let conn = Connection::open(path).map_err(|e| LockError::Database(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| LockError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory lock table (useful for testing).
    pub fn in_memory() -> Result<Self, LockError> {
        let conn = Connection::open_in_memory().map_err(|e| LockError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LockError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_locks (
                key TEXT PRIMARY KEY,
                expires_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| LockError::Database(e.to_string()))
    }
}

impl TaskLock for SqliteTaskLock {
    fn acquire(&self, key: &str, ttl: Duration) -> Result<bool, LockError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().timestamp_millis();
        let expires_at = now + ttl.as_millis() as i64;

        // Insert, or take over an expired entry. A live entry leaves the row
        // untouched and reports zero changes.
        let changed = conn
            .execute(
                "INSERT INTO cache_locks (key, expires_at) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET expires_at = excluded.expires_at
                 WHERE cache_locks.expires_at <= ?3",
                params![key, expires_at, now],
            )
            .map_err(|e| LockError::Database(e.to_string()))?;

        Ok(changed == 1)
    }

    fn release(&self, key: &str) -> Result<(), LockError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM cache_locks WHERE key = ?", params![key])
            .map_err(|e| LockError::Database(e.to_string()))?;
        Ok(())
    }
}
