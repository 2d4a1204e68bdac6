//! Note blob encoding.
//!
//! A task's notes live in a single text field, one note per line:
//!
//! ```text
//! [Task - Demo] called the customer (1/1/2024, 10:00:00 AM)
//! [Lead - Ada Lovelace] sent the quote (1/2/2024, 11:00:00 AM)
//! ```
//!
//! Decoding tolerates two older layouts as well: lines without the
//! `[source]` tag, and bare text with no timestamp at all. Decoding never
//! fails; every non-blank line produces exactly one [`NoteRecord`].
//!
//! Literal brackets or parentheses inside note text are not escaped, so a
//! line like `[a] b (c) (d)` decodes with `text = "b (c)"`. Lines are written
//! as given and read back on a best-effort basis.

use crate::codec::timestamp::now_timestamp;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Source recorded for notes that predate the `[source]` tag.
pub const UNSPECIFIED_SOURCE: &str = "unspecified";

static CANONICAL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(.*?)\]\s*(.*)\s+\((.*)\)$").unwrap());

static UNTAGGED_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(.*)\s+\((.*)\)$").unwrap());

/// One decoded note line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    /// Identifier derived from the owning task and the line position.
    ///
    /// Only meaningful until the blob is rewritten: removing an earlier line
    /// shifts the ids of every line after it.
    pub id: String,
    /// ID of the task whose notes field holds this line.
    pub task_id: i64,
    /// Human-readable provenance, e.g. `Task - Follow up`.
    pub source: String,
    /// The note text.
    pub text: String,
    /// Locale-formatted creation time, stored verbatim.
    pub timestamp: String,
}

impl NoteRecord {
    /// Build a record that has not been written to any blob yet.
    ///
    /// The id is assigned when the blob is decoded again.
    #[must_use]
    pub fn new(
        task_id: i64,
        source: impl Into<String>,
        text: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            task_id,
            source: source.into(),
            text: text.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// Builders for the provenance strings shown in front of each note.
pub struct NoteSource;

impl NoteSource {
    /// Provenance for a note written from a task form.
    #[must_use]
    pub fn task(subject: &str) -> String {
        format!("Task - {subject}")
    }

    /// Provenance for a note written from a lead page.
    #[must_use]
    pub fn lead(name: &str) -> String {
        format!("Lead - {name}")
    }

    /// Provenance for a note written from a contact page.
    #[must_use]
    pub fn contact(name: &str) -> String {
        format!("Contact - {name}")
    }
}

/// Synthesize the id for the line at `index` of `task_id`'s blob.
#[must_use]
pub fn note_id(task_id: i64, index: usize) -> String {
    format!("{task_id}-{index}")
}

/// Encode one note into its canonical line.
#[must_use]
pub fn encode(record: &NoteRecord) -> String {
    format!("[{}] {} ({})", record.source, record.text, record.timestamp)
}

/// Check that a note field fits on one blob line.
///
/// # Errors
///
/// Returns [`Error::InvalidNote`] if `value` contains `\n` or `\r`.
pub fn check_single_line(field: &str, value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(Error::InvalidNote(format!("{field} must not contain line breaks")));
    }
    Ok(())
}

/// Encode a whole list back into a blob, or `None` when there is nothing to store.
#[must_use]
pub fn encode_all(records: &[NoteRecord]) -> Option<String> {
    if records.is_empty() {
        return None;
    }
    Some(records.iter().map(encode).collect::<Vec<_>>().join("\n"))
}

/// Decode a notes blob, stamping untimed lines with the current time.
#[must_use]
pub fn decode(blob: &str, task_id: i64) -> Vec<NoteRecord> {
    decode_at(blob, task_id, &now_timestamp())
}

/// Decode a notes blob, stamping untimed lines with `now`.
#[must_use]
pub fn decode_at(blob: &str, task_id: i64, now: &str) -> Vec<NoteRecord> {
    blob.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| decode_line(line, task_id, index, now))
        .collect()
}

fn decode_line(line: &str, task_id: i64, index: usize, now: &str) -> NoteRecord {
    let id = note_id(task_id, index);

    if let Some(caps) = CANONICAL_LINE.captures(line) {
        return NoteRecord {
            id,
            task_id,
            source: caps[1].to_string(),
            text: caps[2].to_string(),
            timestamp: caps[3].to_string(),
        };
    }

    if let Some(caps) = UNTAGGED_LINE.captures(line) {
        tracing::debug!(task_id, index, "note line has no source tag");
        return NoteRecord {
            id,
            task_id,
            source: UNSPECIFIED_SOURCE.to_string(),
            text: caps[1].to_string(),
            timestamp: caps[2].to_string(),
        };
    }

    tracing::warn!(task_id, index, "note line matches no known layout; keeping it as plain text");
    NoteRecord {
        id,
        task_id,
        source: UNSPECIFIED_SOURCE.to_string(),
        text: line.to_string(),
        timestamp: now.to_string(),
    }
}

/// Append one note to a blob. An absent or empty blob becomes a single line.
#[must_use]
pub fn append(blob: Option<&str>, record: &NoteRecord) -> String {
    match blob {
        Some(existing) if !existing.is_empty() => format!("{existing}\n{}", encode(record)),
        _ => encode(record),
    }
}

/// Drop the note with the given id.
#[must_use]
pub fn remove(records: Vec<NoteRecord>, id: &str) -> Vec<NoteRecord> {
    records.into_iter().filter(|r| r.id != id).collect()
}

/// Replace the text of the note with the given id, keeping source and timestamp.
#[must_use]
pub fn edit(records: Vec<NoteRecord>, id: &str, new_text: &str) -> Vec<NoteRecord> {
    records
        .into_iter()
        .map(|mut r| {
            if r.id == id {
                r.text = new_text.to_string();
            }
            r
        })
        .collect()
}
