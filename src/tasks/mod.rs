//! CRM tasks and the stores that hold them.
//!
//! This module provides:
//! - The [`Task`] row with its parent lead or contact
//! - Status transitions with a terminal `Completed` state
//! - A [`TaskStore`] trait with REST and `SQLite` implementations
//! - [`TaskService`], which edits notes and attachments by read-modify-write
//!
//! # Example
//!
//! ```no_run
//! use crm_notes::tasks::{NewTask, ParentRef, SqliteTaskStore, TaskService};
//!
//! let service = TaskService::new(SqliteTaskStore::new("/tmp/tasks.db").unwrap());
//! let task = service.create_task(NewTask::new("Call back").with_parent(ParentRef::Lead(7))).unwrap();
//!
//! service.add_note(task.id, None, "Left a voicemail").unwrap();
//! let timeline = service.timeline(ParentRef::Lead(7)).unwrap();
//! ```

pub mod http;
pub mod lifecycle;
pub mod models;
pub mod service;
pub mod store;

pub use http::{HttpTaskStore, TaskReadDto, TaskWriteDto};
pub use models::{
    AuditEntry, InvalidPriority, InvalidStatus, NewTask, ParentRef, Priority, Status, Task,
};
pub use service::TaskService;
pub use store::{SqliteTaskStore, TaskStore};
