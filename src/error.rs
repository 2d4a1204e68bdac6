//! Error types for `crm_notes`.

use crate::tasks::models::{InvalidPriority, InvalidStatus};

/// Errors that can occur while reading or mutating tasks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `SQLite` database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The task store could not be reached or returned an unusable response.
    #[error("Store error: {message}")]
    Store {
        /// Human-readable description of the failure.
        message: String,
    },

    /// The task store answered with a non-success HTTP status.
    #[error("Store returned HTTP {status}: {message}")]
    Http {
        /// The HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// A referenced task does not exist.
    #[error("task not found: {0}")]
    TaskNotFound(i64),

    /// A referenced note does not exist in the task's notes.
    #[error("note not found: {0}")]
    NoteNotFound(String),

    /// A referenced attachment does not exist in the task's attachments.
    #[error("attachment not found: {0}")]
    AttachmentNotFound(i64),

    /// A status change was attempted that the lifecycle does not allow.
    #[error("task {task_id}: cannot change status from {from} to {to}")]
    InvalidTransition {
        /// The task whose status change was rejected.
        task_id: i64,
        /// The current status.
        from: String,
        /// The requested status.
        to: String,
    },

    /// A parent reference is missing, non-positive, or ambiguous.
    #[error("invalid parent reference: {0}")]
    InvalidParent(String),

    /// An attachment payload exceeds the configured limit.
    #[error("attachment '{name}' is {size} bytes, limit is {limit} bytes")]
    AttachmentTooLarge {
        /// File name of the rejected attachment.
        name: String,
        /// Raw payload size in bytes.
        size: usize,
        /// The limit in bytes.
        limit: usize,
    },

    /// A note field cannot be stored on a single blob line.
    #[error("invalid note: {0}")]
    InvalidNote(String),

    /// A status name that no lifecycle state matches.
    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),

    /// A priority name that no priority level matches.
    #[error(transparent)]
    InvalidPriority(#[from] InvalidPriority),

    /// An attachment's data URI could not be interpreted.
    #[error("invalid attachment data: {0}")]
    InvalidAttachment(String),

    /// The configuration is incomplete or inconsistent.
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error came from the task store rather than a local check.
    ///
    /// Local rejections (lifecycle, parent, size limits) happen before any
    /// store call, so no partial side effect is possible for them.
    #[must_use]
    pub const fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::Http { .. } | Self::Database(_) | Self::Io(_))
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
