//! Task store trait and `SQLite` implementation.
//!
//! The store only knows whole task rows: there is no partial update, so
//! every note or attachment change is written back with [`TaskStore::replace_task`].
//! `replace_task` is a blind overwrite. Two writers that read the same row
//! and both replace it will lose whichever change landed first.

use crate::error::{Error, Result};
use crate::tasks::models::{AuditEntry, NewTask, ParentRef, Priority, Status, Task};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Trait for task storage operations.
///
/// All methods return a `Result` and may fail with store errors.
#[allow(clippy::missing_errors_doc)]
pub trait TaskStore {
    /// Get a task by ID.
    fn get_task(&self, id: i64) -> Result<Option<Task>>;

    /// List every task attached to `parent`.
    fn list_tasks_by_parent(&self, parent: ParentRef) -> Result<Vec<Task>>;

    /// Create a new task. The store assigns the id.
    fn create_task(&self, task: NewTask) -> Result<Task>;

    /// Replace the entire stored row with `task`, returning the stored result.
    ///
    /// Fails with [`Error::TaskNotFound`] if no row has `task.id`.
    fn replace_task(&self, task: &Task) -> Result<Task>;

    /// Delete a task by ID. Returns `false` if it did not exist.
    fn delete_task(&self, id: i64) -> Result<bool>;
}

const TASK_COLUMNS: &str = "id, lead_id, contact_id, subject, owner, priority, due_date, \
                            description, status, is_notified, closed_at, notes, attachments";

/// SQLite-based task store.
#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    db_path: PathBuf,
}

impl SqliteTaskStore {
    /// Create a new `SQLite` task store at the given database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self { db_path: db_path.as_ref().to_path_buf() };
        store.init_schema()?;
        Ok(store)
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a connection to the database.
    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(conn)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                lead_id INTEGER,
                contact_id INTEGER,
                subject TEXT NOT NULL DEFAULT '',
                owner TEXT NOT NULL DEFAULT '',
                priority TEXT NOT NULL DEFAULT 'Normal',
                due_date TEXT,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'Open',
                is_notified INTEGER NOT NULL DEFAULT 0,
                closed_at TEXT,
                notes TEXT,
                attachments TEXT
            );

            -- Immutable audit log
            CREATE TABLE IF NOT EXISTS task_audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL DEFAULT (datetime('now')),
                operation TEXT NOT NULL,
                task_id INTEGER,
                old_value TEXT,
                new_value TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_lead_id ON tasks(lead_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_contact_id ON tasks(contact_id);
            CREATE INDEX IF NOT EXISTS idx_task_audit_task_id ON task_audit_log(task_id);
            ",
        )?;

        Ok(())
    }

    /// Log an operation to the audit log.
    fn log_audit(
        conn: &Connection,
        operation: &str,
        task_id: i64,
        old: Option<&Task>,
        new: Option<&Task>,
    ) -> Result<()> {
        let old_value = old.map(serde_json::to_string).transpose()?;
        let new_value = new.map(serde_json::to_string).transpose()?;
        conn.execute(
            "INSERT INTO task_audit_log (operation, task_id, old_value, new_value)
             VALUES (?1, ?2, ?3, ?4)",
            params![operation, task_id, old_value, new_value],
        )?;
        Ok(())
    }

    /// Parse a task from a row. Unknown status or priority names fail the read.
    fn parse_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let priority: String = row.get(5)?;
        let status: String = row.get(8)?;
        let closed_at: Option<String> = row.get(10)?;

        Ok(Task {
            id: row.get(0)?,
            lead_id: row.get(1)?,
            contact_id: row.get(2)?,
            subject: row.get(3)?,
            owner: row.get(4)?,
            priority: Priority::from_str(&priority).map_err(|e| unreadable_column(5, e))?,
            due_date: row.get(6)?,
            description: row.get(7)?,
            status: Status::from_str(&status).map_err(|e| unreadable_column(8, e))?,
            is_notified: row.get(9)?,
            closed_at: closed_at
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            notes: row.get(11)?,
            attachments: row.get(12)?,
        })
    }

    fn fetch(conn: &Connection, id: i64) -> Result<Option<Task>> {
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                Self::parse_task,
            )
            .optional()?;
        Ok(task)
    }

    /// Get audit log entries, optionally filtered by task ID, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be queried.
    pub fn get_audit_log(&self, task_id: Option<i64>) -> Result<Vec<AuditEntry>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, operation, task_id, old_value, new_value
             FROM task_audit_log
             WHERE ?1 IS NULL OR task_id = ?1
             ORDER BY id DESC",
        )?;
        let entries = stmt
            .query_map(params![task_id], |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    operation: row.get(2)?,
                    task_id: row.get(3)?,
                    old_value: row.get(4)?,
                    new_value: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

fn unreadable_column(
    index: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

impl TaskStore for SqliteTaskStore {
    fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let conn = self.open()?;
        Self::fetch(&conn, id)
    }

    fn list_tasks_by_parent(&self, parent: ParentRef) -> Result<Vec<Task>> {
        let conn = self.open()?;
        let column = match parent {
            ParentRef::Lead(_) => "lead_id",
            ParentRef::Contact(_) => "contact_id",
        };
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE {column} = ?1 ORDER BY id ASC");
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(params![parent.id()], Self::parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn create_task(&self, task: NewTask) -> Result<Task> {
        let conn = self.open()?;
        let draft = task.into_task(0);

        conn.execute(
            "INSERT INTO tasks (lead_id, contact_id, subject, owner, priority, due_date,
                                description, status, is_notified, closed_at, notes, attachments)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                draft.lead_id,
                draft.contact_id,
                draft.subject,
                draft.owner,
                draft.priority.as_str(),
                draft.due_date,
                draft.description,
                draft.status.as_str(),
                draft.is_notified,
                draft.closed_at.map(|dt| dt.to_rfc3339()),
                draft.notes,
                draft.attachments,
            ],
        )?;

        let id = conn.last_insert_rowid();
        let created = Self::fetch(&conn, id)?.ok_or(Error::TaskNotFound(id))?;
        Self::log_audit(&conn, "create", id, None, Some(&created))?;
        tracing::debug!(task_id = id, "created task");
        Ok(created)
    }

    fn replace_task(&self, task: &Task) -> Result<Task> {
        let conn = self.open()?;
        let old = Self::fetch(&conn, task.id)?.ok_or(Error::TaskNotFound(task.id))?;

        conn.execute(
            "UPDATE tasks SET lead_id = ?1, contact_id = ?2, subject = ?3, owner = ?4,
                priority = ?5, due_date = ?6, description = ?7, status = ?8,
                is_notified = ?9, closed_at = ?10, notes = ?11, attachments = ?12
             WHERE id = ?13",
            params![
                task.lead_id,
                task.contact_id,
                task.subject,
                task.owner,
                task.priority.as_str(),
                task.due_date,
                task.description,
                task.status.as_str(),
                task.is_notified,
                task.closed_at.map(|dt| dt.to_rfc3339()),
                task.notes,
                task.attachments,
                task.id,
            ],
        )?;

        let new = Self::fetch(&conn, task.id)?.ok_or(Error::TaskNotFound(task.id))?;
        Self::log_audit(&conn, "replace", task.id, Some(&old), Some(&new))?;
        tracing::debug!(task_id = task.id, "replaced task");
        Ok(new)
    }

    fn delete_task(&self, id: i64) -> Result<bool> {
        let conn = self.open()?;
        let Some(task) = Self::fetch(&conn, id)? else {
            return Ok(false);
        };

        let rows = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if rows > 0 {
            Self::log_audit(&conn, "delete", id, Some(&task), None)?;
            tracing::debug!(task_id = id, "deleted task");
        }
        Ok(rows > 0)
    }
}
