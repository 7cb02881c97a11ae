//! SQLite-backed task store implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};

use super::{
    CreateTaskRequest, Task, TaskError, TaskFilter, TaskStatus, TaskStore, MAX_MESSAGE_CHARS,
};
use crate::service::ServiceKind;
use crate::worker::truncate_chars;

const TASK_COLUMNS: &str =
    "id, ticket, service, status, message, created_at, updated_at, deleted_at";

/// SQLite-backed task store.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Create a new SQLite task store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TaskError> {
        let conn = Connection::open(path).map_err(|e| TaskError::Database(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| TaskError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite task store (useful for testing).
    pub fn in_memory() -> Result<Self, TaskError> {
        let conn = Connection::open_in_memory().map_err(|e| TaskError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TaskError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS naiade_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket TEXT NOT NULL UNIQUE,
                service TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_naiade_tasks_status ON naiade_tasks(status);
            "#,
        )
        .map_err(|e| TaskError::Database(e.to_string()))
    }

    fn build_where_clause(filter: &TaskFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = vec!["deleted_at IS NULL"];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        (format!("WHERE {}", conditions.join(" AND ")), params)
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let service_str: String = row.get(2)?;
        let status_str: String = row.get(3)?;
        let created_at_str: String = row.get(5)?;
        let updated_at_str: String = row.get(6)?;
        let deleted_at_str: Option<String> = row.get(7)?;

        let service: ServiceKind = service_str
            .parse()
            .map_err(|e| conversion_error(2, e))?;
        let status: TaskStatus = status_str.parse().map_err(|e| conversion_error(3, e))?;

        Ok(Task {
            id: row.get(0)?,
            ticket: row.get(1)?,
            service,
            status,
            message: row.get(4)?,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
            deleted_at: deleted_at_str.as_deref().map(parse_timestamp),
        })
    }

    fn fetch(conn: &Connection, ticket: &str) -> Result<Option<Task>, TaskError> {
        let result = conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM naiade_tasks WHERE ticket = ? AND deleted_at IS NULL"),
            params![ticket],
            Self::row_to_task,
        );

        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TaskError::Database(e.to_string())),
        }
    }
}

fn conversion_error<E>(column: usize, error: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(error))
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl TaskStore for SqliteTaskStore {
    fn create(&self, request: CreateTaskRequest) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let result = conn.execute(
            "INSERT INTO naiade_tasks (ticket, service, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            params![
                request.ticket,
                request.service.as_str(),
                TaskStatus::Pending.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(TaskError::AlreadyExists(request.ticket));
            }
            Err(e) => return Err(TaskError::Database(e.to_string())),
        }

        Ok(Task {
            id: conn.last_insert_rowid(),
            ticket: request.ticket,
            service: request.service,
            status: TaskStatus::Pending,
            message: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    fn get(&self, ticket: &str) -> Result<Option<Task>, TaskError> {
        let conn = self.conn.lock().unwrap();
        Self::fetch(&conn, ticket)
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM naiade_tasks {where_clause} ORDER BY id ASC LIMIT ? OFFSET ?"
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TaskError::Database(e.to_string()))?;

        let mut all_params = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_task)
            .map_err(|e| TaskError::Database(e.to_string()))?;

        let mut tasks = Vec::new();
        for row_result in rows {
            tasks.push(row_result.map_err(|e| TaskError::Database(e.to_string()))?);
        }

        Ok(tasks)
    }

    fn count(&self, filter: &TaskFilter) -> Result<i64, TaskError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM naiade_tasks {where_clause}");
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| TaskError::Database(e.to_string()))
    }

    fn transition(
        &self,
        ticket: &str,
        to: TaskStatus,
        message: Option<&str>,
    ) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let current = Self::fetch(&conn, ticket)?
            .ok_or_else(|| TaskError::NotFound(ticket.to_string()))?;

        if !current.status.can_transition_to(to) {
            return Err(TaskError::InvalidTransition {
                ticket: ticket.to_string(),
                from: current.status,
                to,
            });
        }

        let now = Utc::now();
        let message = message.map(|m| truncate_chars(m, MAX_MESSAGE_CHARS));

        // Guarded on the status we validated against.
        let changed = conn
            .execute(
                "UPDATE naiade_tasks SET status = ?, message = ?, updated_at = ? WHERE ticket = ? AND status = ? AND deleted_at IS NULL",
                params![
                    to.as_str(),
                    message,
                    now.to_rfc3339(),
                    ticket,
                    current.status.as_str(),
                ],
            )
            .map_err(|e| TaskError::Database(e.to_string()))?;

        if changed == 0 {
            let from = Self::fetch(&conn, ticket)?
                .map(|t| t.status)
                .unwrap_or(current.status);
            return Err(TaskError::InvalidTransition {
                ticket: ticket.to_string(),
                from,
                to,
            });
        }

        Ok(Task {
            status: to,
            message,
            updated_at: now,
            ..current
        })
    }

    fn soft_delete(&self, ticket: &str) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let current = Self::fetch(&conn, ticket)?
            .ok_or_else(|| TaskError::NotFound(ticket.to_string()))?;

        let now = Utc::now();
        conn.execute(
            "UPDATE naiade_tasks SET deleted_at = ?, updated_at = ? WHERE ticket = ?",
            params![now.to_rfc3339(), now.to_rfc3339(), ticket],
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(Task {
            deleted_at: Some(now),
            updated_at: now,
            ..current
        })
    }
}
