//! SQLite-backed job queue.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{JobQueue, QueueEntry, QueueError, QueuedJob};

/// Job queues stored in the `jobs` table.
pub struct SqliteJobQueue {
    conn: Mutex<Connection>,
}

impl SqliteJobQueue {
    pub fn new(path: &Path) -> Result<Self, QueueError> {
        let conn = Connection::open(path).map_err(|e| QueueError::Database(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| QueueError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().map_err(|e| QueueError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), QueueError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_queue ON jobs(queue, id);
            "#,
        )
        .map_err(|e| QueueError::Database(e.to_string()))
    }

    /// Insert a raw payload. Lets callers (and tests) enqueue records that
    /// did not come from a [`QueuedJob`].
    pub fn push_raw(&self, queue: &str, payload: &str) -> Result<i64, QueueError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO jobs (queue, payload, created_at) VALUES (?, ?, ?)",
            params![queue, payload, Utc::now().to_rfc3339()],
        )
        .map_err(|e| QueueError::Database(e.to_string()))?;
        Ok(conn.last_insert_rowid())
    }
}

impl JobQueue for SqliteJobQueue {
    fn push(&self, queue: &str, job: &QueuedJob) -> Result<i64, QueueError> {
        let payload = serde_json::to_string(job).map_err(|e| QueueError::Encode(e.to_string()))?;
        self.push_raw(queue, &payload)
    }

    fn pop(&self, queue: &str) -> Result<Option<QueueEntry>, QueueError> {
        let conn = self.conn.lock().unwrap();

        // Single statement, so two processes never pop the same row.
        conn.query_row(
            "DELETE FROM jobs
             WHERE id = (SELECT id FROM jobs WHERE queue = ?1 ORDER BY id ASC LIMIT 1)
             RETURNING id, queue, payload, created_at",
            params![queue],
            |row| {
                let created_at: String = row.get(3)?;
                Ok(QueueEntry {
                    id: row.get(0)?,
                    queue: row.get(1)?,
                    payload: row.get(2)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            },
        )
        .optional()
        .map_err(|e| QueueError::Database(e.to_string()))
    }

    fn count(&self, queue: &str) -> Result<u64, QueueError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM jobs WHERE queue = ?",
                params![queue],
                |row| row.get(0),
            )
            .map_err(|e| QueueError::Database(e.to_string()))?;
        Ok(count as u64)
    }

    fn pending_payloads(&self, queue: &str) -> Result<Vec<String>, QueueError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT payload FROM jobs WHERE queue = ? ORDER BY id ASC")
            .map_err(|e| QueueError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![queue], |row| row.get::<_, String>(0))
            .map_err(|e| QueueError::Database(e.to_string()))?;

        let mut payloads = Vec::new();
        for row in rows {
            payloads.push(row.map_err(|e| QueueError::Database(e.to_string()))?);
        }
        Ok(payloads)
    }
}
