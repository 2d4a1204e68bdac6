//! Merged note timelines for leads and contacts.
//!
//! A lead or contact has no notes of its own: its notes are spread over the
//! notes fields of every task that points at it. [`aggregate`] collects
//! them into one list, newest first, with each entry remembering the task it
//! came from.

use crate::codec::notes;
use crate::codec::timestamp::{now_timestamp, parse_timestamp};
use crate::codec::NoteRecord;
use crate::tasks::models::{ParentRef, Task};
use chrono::NaiveDateTime;
use serde::Serialize;

/// One note in a parent's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    /// The decoded note. `note.task_id` names the owning task.
    #[serde(flatten)]
    pub note: NoteRecord,
    /// The parsed timestamp, or `None` if it matched no known layout.
    pub at: Option<NaiveDateTime>,
}

impl TimelineEntry {
    /// ID of the task holding this note.
    #[must_use]
    pub const fn task_id(&self) -> i64 {
        self.note.task_id
    }
}

/// Build the timeline for `parent` from a set of candidate tasks.
///
/// Tasks that do not belong to exactly `parent` are skipped, including rows
/// of the other parent kind with the same numeric id and rows that name both
/// a lead and a contact. Entries are ordered newest first; entries with equal
/// or unparseable timestamps keep their task-then-line order, and
/// unparseable ones come last.
#[must_use]
pub fn aggregate(parent: ParentRef, tasks: &[Task]) -> Vec<TimelineEntry> {
    aggregate_at(parent, tasks, &now_timestamp())
}

/// [`aggregate`] with an explicit timestamp for notes that carry none.
#[must_use]
pub fn aggregate_at(parent: ParentRef, tasks: &[Task], now: &str) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = tasks
        .iter()
        .filter(|task| {
            let belongs = task.parent_ref() == Some(parent);
            if !belongs {
                tracing::debug!(task_id = task.id, %parent, "excluding task from timeline");
            }
            belongs
        })
        .filter_map(|task| task.notes.as_deref().map(|blob| notes::decode_at(blob, task.id, now)))
        .flatten()
        .map(|note| {
            let at = parse_timestamp(&note.timestamp);
            if at.is_none() {
                tracing::debug!(note_id = %note.id, timestamp = %note.timestamp, "unparseable note timestamp");
            }
            TimelineEntry { note, at }
        })
        .collect();

    // `None < Some(_)`, so reversing the comparison puts unparseable entries last.
    entries.sort_by(|a, b| b.at.cmp(&a.at));
    entries
}
