//! Note, attachment and status operations on stored tasks.
//!
//! Every mutation follows the same sequence: fetch the task, decode the
//! affected blob, change the list, encode it again and replace the whole
//! row. The returned values always come from the row the store confirmed,
//! never from the locally edited copy, so a failed write is never reported
//! as applied.
//!
//! Local checks (parent ids, lifecycle rules, attachment size) run before
//! the store is contacted.

use crate::codec::attachments::{self, AttachmentRecord, DEFAULT_MAX_ATTACHMENT_BYTES};
use crate::codec::notes::{self, NoteRecord, NoteSource};
use crate::codec::timestamp::now_timestamp;
use crate::error::{Error, Result};
use crate::tasks::lifecycle;
use crate::tasks::models::{NewTask, ParentRef, Status, Task};
use crate::tasks::store::TaskStore;
use crate::timeline::{self, TimelineEntry};
use chrono::Utc;

/// Read-modify-write operations over a [`TaskStore`].
#[derive(Debug, Clone)]
pub struct TaskService<S> {
    store: S,
    max_attachment_bytes: usize,
}

impl<S: TaskStore> TaskService<S> {
    /// Create a service using the default attachment size limit.
    pub const fn new(store: S) -> Self {
        Self { store, max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES }
    }

    /// Override the attachment size limit.
    #[must_use]
    pub fn with_max_attachment_bytes(mut self, limit: usize) -> Self {
        self.max_attachment_bytes = limit;
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Fetch a task that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskNotFound`] if it does not, or a store error.
    pub fn get_task(&self, id: i64) -> Result<Task> {
        if id <= 0 {
            return Err(Error::TaskNotFound(id));
        }
        self.store.get_task(id)?.ok_or(Error::TaskNotFound(id))
    }

    /// Create a task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParent`] for a non-positive parent id, or a
    /// store error.
    pub fn create_task(&self, task: NewTask) -> Result<Task> {
        if let Some(parent) = task.parent {
            parent.validate()?;
        }
        let created = self.store.create_task(task)?;
        tracing::info!(task_id = created.id, "task created");
        Ok(created)
    }

    /// Delete a task and everything stored on it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskNotFound`] if the task does not exist, or a store error.
    pub fn delete_task(&self, id: i64) -> Result<()> {
        if !self.store.delete_task(id)? {
            return Err(Error::TaskNotFound(id));
        }
        tracing::info!(task_id = id, "task deleted");
        Ok(())
    }

    fn replace(&self, task: &Task, action: &str) -> Result<Task> {
        match self.store.replace_task(task) {
            Ok(stored) => {
                tracing::info!(task_id = task.id, action, "task updated");
                Ok(stored)
            }
            Err(e) => {
                tracing::warn!(task_id = task.id, action, error = %e, "task update failed");
                Err(e)
            }
        }
    }

    // Notes

    /// Decoded notes of a task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskNotFound`] or a store error.
    pub fn notes(&self, task_id: i64) -> Result<Vec<NoteRecord>> {
        Ok(self.get_task(task_id)?.decoded_notes())
    }

    /// Append a note stamped with the current time.
    ///
    /// `source` defaults to `Task - <subject>`. Returns the notes as stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNote`] without writing if `text` or the source
    /// spans more than one line, [`Error::TaskNotFound`], or a store error.
    pub fn add_note(&self, task_id: i64, source: Option<&str>, text: &str) -> Result<Vec<NoteRecord>> {
        notes::check_single_line("note text", text)?;
        if let Some(source) = source {
            notes::check_single_line("note source", source)?;
        }

        let mut task = self.get_task(task_id)?;
        let source = source.map_or_else(|| NoteSource::task(&task.subject), str::to_string);
        notes::check_single_line("note source", &source)?;
        let record = NoteRecord::new(task_id, source, text, now_timestamp());

        task.notes = Some(notes::append(task.notes.as_deref(), &record));
        Ok(self.replace(&task, "add_note")?.decoded_notes())
    }

    /// Replace the text of one note.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNote`] without writing if `text` spans more than
    /// one line, [`Error::NoteNotFound`] if no note has `note_id`, or a store error.
    pub fn edit_note(&self, task_id: i64, note_id: &str, text: &str) -> Result<Vec<NoteRecord>> {
        notes::check_single_line("note text", text)?;
        let mut task = self.get_task(task_id)?;
        let current = task.decoded_notes();
        if !current.iter().any(|n| n.id == note_id) {
            return Err(Error::NoteNotFound(note_id.to_string()));
        }

        task.notes = notes::encode_all(&notes::edit(current, note_id, text));
        Ok(self.replace(&task, "edit_note")?.decoded_notes())
    }

    /// Remove one note.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoteNotFound`] if no note has `note_id`, or a store error.
    pub fn delete_note(&self, task_id: i64, note_id: &str) -> Result<Vec<NoteRecord>> {
        let mut task = self.get_task(task_id)?;
        let current = task.decoded_notes();
        if !current.iter().any(|n| n.id == note_id) {
            return Err(Error::NoteNotFound(note_id.to_string()));
        }

        task.notes = notes::encode_all(&notes::remove(current, note_id));
        Ok(self.replace(&task, "delete_note")?.decoded_notes())
    }

    // Attachments

    /// Decoded attachments of a task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskNotFound`] or a store error.
    pub fn attachments(&self, task_id: i64) -> Result<Vec<AttachmentRecord>> {
        Ok(self.get_task(task_id)?.decoded_attachments())
    }

    /// Store a new attachment and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentTooLarge`] before contacting the store if
    /// `bytes` exceeds the limit, [`Error::TaskNotFound`], or a store error.
    pub fn add_attachment(
        &self,
        task_id: i64,
        name: &str,
        mime_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<AttachmentRecord> {
        let mut record = AttachmentRecord::from_bytes(
            Utc::now().timestamp_millis(),
            name,
            mime_type,
            bytes,
            self.max_attachment_bytes,
        )?;

        let mut task = self.get_task(task_id)?;
        let mut list = task.decoded_attachments();
        while list.iter().any(|a| a.id == record.id) {
            record.id += 1;
        }
        let id = record.id;
        list.push(record);

        task.attachments = attachments::encode(&list);
        self.replace(&task, "add_attachment")?
            .decoded_attachments()
            .into_iter()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::Store { message: format!("attachment {id} was not stored") })
    }

    /// Remove one attachment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentNotFound`] if no attachment has `attachment_id`,
    /// or a store error.
    pub fn remove_attachment(&self, task_id: i64, attachment_id: i64) -> Result<Vec<AttachmentRecord>> {
        let mut task = self.get_task(task_id)?;
        let current = task.decoded_attachments();
        if !current.iter().any(|a| a.id == attachment_id) {
            return Err(Error::AttachmentNotFound(attachment_id));
        }

        task.attachments = attachments::encode(&attachments::remove(current, attachment_id));
        Ok(self.replace(&task, "remove_attachment")?.decoded_attachments())
    }

    // Lifecycle

    /// Move a task to `status`. Moving to `Completed` closes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] without writing if the task is
    /// completed, [`Error::TaskNotFound`], or a store error.
    pub fn set_status(&self, task_id: i64, status: Status) -> Result<Task> {
        let mut task = self.get_task(task_id)?;
        lifecycle::transition(&mut task, status, Utc::now())?;
        self.replace(&task, "set_status")
    }

    /// Close a task, stamping its closing time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] without writing if the task is
    /// already completed, [`Error::TaskNotFound`], or a store error.
    pub fn close_task(&self, task_id: i64) -> Result<Task> {
        let mut task = self.get_task(task_id)?;
        lifecycle::close(&mut task, Utc::now())?;
        self.replace(&task, "close_task")
    }

    /// Mark a task's owner as notified. Does not write if already set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskNotFound`] or a store error.
    pub fn mark_notified(&self, task_id: i64) -> Result<Task> {
        let mut task = self.get_task(task_id)?;
        if !lifecycle::mark_notified(&mut task) {
            return Ok(task);
        }
        self.replace(&task, "mark_notified")
    }

    // Timeline

    /// All notes of a lead or contact, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParent`] without contacting the store for a
    /// non-positive id, or a store error.
    pub fn timeline(&self, parent: ParentRef) -> Result<Vec<TimelineEntry>> {
        let parent = parent.validate()?;
        let tasks = self.store.list_tasks_by_parent(parent)?;
        Ok(timeline::aggregate(parent, &tasks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryTaskStore;

    fn service() -> TaskService<MemoryTaskStore> {
        TaskService::new(MemoryTaskStore::new())
    }

    fn with_task(svc: &TaskService<MemoryTaskStore>, subject: &str) -> Task {
        svc.create_task(NewTask::new(subject).with_parent(ParentRef::Lead(1))).unwrap()
    }

    #[test]
    fn test_add_note_defaults_source_to_task_subject() {
        let svc = service();
        let task = with_task(&svc, "Demo");

        let notes = svc.add_note(task.id, None, "hello").unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].source, "Task - Demo");
        assert_eq!(notes[0].text, "hello");
        assert!(crate::codec::parse_timestamp(&notes[0].timestamp).is_some());
    }

    #[test]
    fn test_add_note_appends_after_existing() {
        let svc = service();
        let task = with_task(&svc, "Demo");
        svc.add_note(task.id, Some("Lead - Ada"), "first").unwrap();
        let notes = svc.add_note(task.id, Some("X"), "second").unwrap();

        assert_eq!(notes.iter().map(|n| n.text.as_str()).collect::<Vec<_>>(), ["first", "second"]);
        assert_eq!(notes[0].source, "Lead - Ada");
        assert_eq!(svc.store().replace_count(), 2);
    }

    #[test]
    fn test_edit_note_keeps_source_and_timestamp() {
        let svc = service();
        let task = with_task(&svc, "Demo");
        let before = svc.add_note(task.id, None, "draft").unwrap();

        let after = svc.edit_note(task.id, &before[0].id, "final").unwrap();
        assert_eq!(after[0].text, "final");
        assert_eq!(after[0].source, before[0].source);
        assert_eq!(after[0].timestamp, before[0].timestamp);
    }

    #[test]
    fn test_delete_last_note_clears_blob() {
        let svc = service();
        let task = with_task(&svc, "Demo");
        let notes = svc.add_note(task.id, None, "only").unwrap();

        assert!(svc.delete_note(task.id, &notes[0].id).unwrap().is_empty());
        assert_eq!(svc.get_task(task.id).unwrap().notes, None);
    }

    #[test]
    fn test_unknown_note_is_rejected_without_write() {
        let svc = service();
        let task = with_task(&svc, "Demo");
        svc.add_note(task.id, None, "one").unwrap();
        let writes = svc.store().replace_count();

        assert!(matches!(svc.edit_note(task.id, "999-0", "x"), Err(Error::NoteNotFound(_))));
        assert!(matches!(svc.delete_note(task.id, "999-0"), Err(Error::NoteNotFound(_))));
        assert_eq!(svc.store().replace_count(), writes);
    }

    #[test]
    fn test_multiline_note_is_rejected_before_store() {
        let svc = service();
        let task = with_task(&svc, "Demo");
        let calls = svc.store().call_count();

        for text in ["line one\nline two", "line one\r\nline two", "trailing\r"] {
            assert!(matches!(svc.add_note(task.id, None, text), Err(Error::InvalidNote(_))));
        }
        assert!(matches!(
            svc.add_note(task.id, Some("Lead -\nAda"), "hello"),
            Err(Error::InvalidNote(_))
        ));
        assert_eq!(svc.store().call_count(), calls);
        assert_eq!(svc.get_task(task.id).unwrap().notes, None);
    }

    #[test]
    fn test_multiline_edit_keeps_note_intact() {
        let svc = service();
        let task = with_task(&svc, "Demo");
        let before = svc.add_note(task.id, None, "draft").unwrap();
        let writes = svc.store().replace_count();

        let err = svc.edit_note(task.id, &before[0].id, "line one\nline two").unwrap_err();
        assert!(matches!(err, Error::InvalidNote(_)));
        assert!(!err.is_store_failure());
        assert_eq!(svc.store().replace_count(), writes);
        assert_eq!(svc.notes(task.id).unwrap(), before);
    }

    #[test]
    fn test_multiline_subject_cannot_become_default_source() {
        let svc = service();
        let task = with_task(&svc, "two\nlines");
        assert!(matches!(svc.add_note(task.id, None, "hello"), Err(Error::InvalidNote(_))));
        assert_eq!(svc.store().replace_count(), 0);
    }

    #[test]
    fn test_missing_task() {
        let svc = service();
        assert!(matches!(svc.add_note(42, None, "x"), Err(Error::TaskNotFound(42))));
        assert!(matches!(svc.get_task(0), Err(Error::TaskNotFound(0))));
        assert!(matches!(svc.delete_task(42), Err(Error::TaskNotFound(42))));
    }

    #[test]
    fn test_failed_write_is_not_reported_as_applied() {
        let svc = service();
        let task = with_task(&svc, "Demo");
        svc.store().fail_next_replace("connection reset");

        let err = svc.add_note(task.id, None, "lost").unwrap_err();
        assert!(err.is_store_failure());
        assert!(svc.notes(task.id).unwrap().is_empty());
    }

    #[test]
    fn test_attachments_round_trip_through_store() {
        let svc = service();
        let task = with_task(&svc, "Demo");

        let stored = svc.add_attachment(task.id, "hello.txt", Some("text/plain"), b"hello").unwrap();
        assert_eq!(stored.name, "hello.txt");
        assert_eq!(stored.payload().unwrap(), b"hello");

        let second = svc.add_attachment(task.id, "again.txt", None, b"x").unwrap();
        assert_ne!(second.id, stored.id);
        assert_eq!(svc.attachments(task.id).unwrap().len(), 2);

        let remaining = svc.remove_attachment(task.id, stored.id).unwrap();
        assert_eq!(remaining, vec![second.clone()]);

        svc.remove_attachment(task.id, second.id).unwrap();
        assert_eq!(svc.get_task(task.id).unwrap().attachments, None);
    }

    #[test]
    fn test_oversized_attachment_rejected_before_store() {
        let svc = TaskService::new(MemoryTaskStore::new()).with_max_attachment_bytes(4);
        let err = svc.add_attachment(1, "big.bin", None, &[0; 5]).unwrap_err();
        assert!(matches!(err, Error::AttachmentTooLarge { .. }));
        assert_eq!(svc.store().call_count(), 0);
    }

    #[test]
    fn test_remove_unknown_attachment() {
        let svc = service();
        let task = with_task(&svc, "Demo");
        assert!(matches!(svc.remove_attachment(task.id, 5), Err(Error::AttachmentNotFound(5))));
    }

    #[test]
    fn test_close_task_and_terminal_guard() {
        let svc = service();
        let task = with_task(&svc, "Demo");
        svc.set_status(task.id, Status::InProgress).unwrap();

        let closed = svc.close_task(task.id).unwrap();
        assert_eq!(closed.status, Status::Completed);
        let closed_at = closed.closed_at.unwrap();
        let writes = svc.store().replace_count();

        let err = svc.set_status(task.id, Status::Open).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert!(!err.is_store_failure());
        assert!(matches!(svc.close_task(task.id), Err(Error::InvalidTransition { .. })));

        assert_eq!(svc.store().replace_count(), writes);
        assert_eq!(svc.get_task(task.id).unwrap().closed_at, Some(closed_at));
    }

    #[test]
    fn test_mark_notified_writes_once() {
        let svc = service();
        let task = with_task(&svc, "Demo");
        assert!(svc.mark_notified(task.id).unwrap().is_notified);
        assert!(svc.mark_notified(task.id).unwrap().is_notified);
        assert_eq!(svc.store().replace_count(), 1);
    }

    #[test]
    fn test_invalid_parent_rejected_before_store() {
        let svc = service();
        assert!(matches!(svc.timeline(ParentRef::Lead(0)), Err(Error::InvalidParent(_))));
        assert!(matches!(
            svc.create_task(NewTask::new("x").with_parent(ParentRef::Contact(-1))),
            Err(Error::InvalidParent(_))
        ));
        assert_eq!(svc.store().call_count(), 0);
    }

    #[test]
    fn test_timeline_merges_tasks_of_parent() {
        let svc = service();
        let a = with_task(&svc, "A");
        let b = with_task(&svc, "B");
        let other = svc.create_task(NewTask::new("C").with_parent(ParentRef::Contact(1))).unwrap();

        let mut task_a = svc.get_task(a.id).unwrap();
        task_a.notes = Some("[Task - A] older (1/1/2024, 10:00:00 AM)".to_string());
        svc.store().replace_task(&task_a).unwrap();
        let mut task_b = svc.get_task(b.id).unwrap();
        task_b.notes = Some("[Task - B] newer (1/2/2024, 10:00:00 AM)".to_string());
        svc.store().replace_task(&task_b).unwrap();
        svc.add_note(other.id, None, "contact only").unwrap();

        let timeline = svc.timeline(ParentRef::Lead(1)).unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].note.text, "newer");
        assert_eq!(timeline[0].task_id(), b.id);
        assert_eq!(timeline[1].task_id(), a.id);
    }
}
