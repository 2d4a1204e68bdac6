//! Testing utilities and mock implementations.
//!
//! These types are provided for use in tests. They may appear unused in
//! the library itself but are consumed by unit and integration tests.

#![allow(dead_code)]

use crate::error::{Error, Result};
use crate::tasks::models::{NewTask, ParentRef, Task};
use crate::tasks::store::TaskStore;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// An in-memory task store.
///
/// Counts calls and can be told to fail the next replace, which is how tests
/// exercise the "write did not happen" paths.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: RefCell<BTreeMap<i64, Task>>,
    next_id: Cell<i64>,
    calls: Cell<usize>,
    replaces: Cell<usize>,
    fail_replace: RefCell<Option<String>>,
}

impl MemoryTaskStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row as-is, bypassing validation. Useful for malformed rows.
    pub fn insert_raw(&self, task: Task) {
        if task.id >= self.next_id.get() {
            self.next_id.set(task.id);
        }
        self.tasks.borrow_mut().insert(task.id, task);
    }

    /// Make the next `replace_task` call fail with a store error.
    pub fn fail_next_replace(&self, message: &str) {
        *self.fail_replace.borrow_mut() = Some(message.to_string());
    }

    /// Number of trait calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.get()
    }

    /// Number of successful `replace_task` calls made so far.
    pub fn replace_count(&self) -> usize {
        self.replaces.get()
    }

    fn record_call(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl TaskStore for MemoryTaskStore {
    fn get_task(&self, id: i64) -> Result<Option<Task>> {
        self.record_call();
        Ok(self.tasks.borrow().get(&id).cloned())
    }

    fn list_tasks_by_parent(&self, parent: ParentRef) -> Result<Vec<Task>> {
        self.record_call();
        let tasks = self.tasks.borrow();
        Ok(tasks
            .values()
            .filter(|t| match parent {
                ParentRef::Lead(id) => t.lead_id == Some(id),
                ParentRef::Contact(id) => t.contact_id == Some(id),
            })
            .cloned()
            .collect())
    }

    fn create_task(&self, task: NewTask) -> Result<Task> {
        self.record_call();
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let task = task.into_task(id);
        self.tasks.borrow_mut().insert(id, task.clone());
        Ok(task)
    }

    fn replace_task(&self, task: &Task) -> Result<Task> {
        self.record_call();
        if let Some(message) = self.fail_replace.borrow_mut().take() {
            return Err(Error::Store { message });
        }
        let mut tasks = self.tasks.borrow_mut();
        let slot = tasks.get_mut(&task.id).ok_or(Error::TaskNotFound(task.id))?;
        *slot = task.clone();
        self.replaces.set(self.replaces.get() + 1);
        Ok(task.clone())
    }

    fn delete_task(&self, id: i64) -> Result<bool> {
        self.record_call();
        Ok(self.tasks.borrow_mut().remove(&id).is_some())
    }
}
