//! # `crm_notes`
//!
//! Notes, attachments and lifecycle for CRM tasks.
//!
//! A task carries its notes and attachments as two opaque text blobs. The
//! [`codec`] module turns those blobs into records and back, [`tasks`] moves
//! tasks through their statuses and persists edits, and [`timeline`] merges
//! the notes of every task under one lead or contact.

pub mod codec;
pub mod config;
pub mod error;
pub mod tasks;
pub mod testing;
pub mod timeline;

#[cfg(feature = "cli")]
pub mod cli;

pub use codec::{AttachmentRecord, NoteRecord, NoteSource};
pub use error::{Error, Result};
pub use tasks::{ParentRef, Status, Task, TaskService, TaskStore};
pub use timeline::TimelineEntry;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
