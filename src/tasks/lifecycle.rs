//! Task status transitions.
//!
//! ```text
//! Open ──> NotStarted | Postponed | InProgress | WaitingInput ──> Completed
//! ```
//!
//! Any non-terminal status may move to any other non-terminal status.
//! Entering `Completed` stamps `closed_at`; nothing leaves `Completed`.
//! The notified flag is independent of status and only ever goes from
//! `false` to `true`.
//!
//! These functions mutate an in-memory [`Task`] and never touch a store, so a
//! rejected transition has no side effect anywhere.

use crate::error::{Error, Result};
use crate::tasks::models::{Status, Task};
use chrono::{DateTime, Utc};

/// Check whether `task` may move to `target` without changing it.
///
/// # Errors
///
/// Returns [`Error::InvalidTransition`] if the task is already completed.
pub fn check_transition(task: &Task, target: Status) -> Result<()> {
    if task.status.is_terminal() {
        return Err(Error::InvalidTransition {
            task_id: task.id,
            from: task.status.to_string(),
            to: target.to_string(),
        });
    }
    Ok(())
}

/// Move `task` to `target`.
///
/// Moving to `Completed` behaves exactly like [`close`].
///
/// # Errors
///
/// Returns [`Error::InvalidTransition`] if the task is already completed;
/// the task is left untouched.
pub fn transition(task: &mut Task, target: Status, now: DateTime<Utc>) -> Result<()> {
    check_transition(task, target)?;
    if target.is_terminal() {
        return close(task, now);
    }
    task.status = target;
    Ok(())
}

/// Close `task`, stamping `closed_at` with `now`.
///
/// # Errors
///
/// Returns [`Error::InvalidTransition`] if the task is already completed;
/// `closed_at` keeps its original value.
pub fn close(task: &mut Task, now: DateTime<Utc>) -> Result<()> {
    check_transition(task, Status::Completed)?;
    task.status = Status::Completed;
    task.closed_at = Some(now);
    Ok(())
}

/// Mark the task's owner as notified. Allowed in every status.
///
/// Returns `true` if the flag changed.
pub fn mark_notified(task: &mut Task) -> bool {
    let changed = !task.is_notified;
    task.is_notified = true;
    changed
}
