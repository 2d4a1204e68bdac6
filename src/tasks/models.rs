//! Task model types.

use crate::codec::{attachments, notes, AttachmentRecord, NoteRecord};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Priority {
    /// Low priority.
    Low,
    /// Normal priority (default).
    #[default]
    Normal,
    /// High priority.
    High,
}

impl Priority {
    /// Parse a priority from its wire code.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a known priority.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> std::result::Result<Self, InvalidPriority> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" | "medium" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            _ => Err(InvalidPriority(s.to_string())),
        }
    }

    /// Wire code of the priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Normal => "Normal",
            Self::High => "High",
        }
    }

    /// Badge color used when rendering the priority.
    #[must_use]
    pub const fn badge_color(self) -> &'static str {
        match self {
            Self::Low => "green",
            Self::Normal => "blue",
            Self::High => "red",
        }
    }
}

/// Error when an invalid priority string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPriority(pub String);

impl std::fmt::Display for InvalidPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid priority: '{}' (must be one of: Low, Normal, High)", self.0)
    }
}

impl std::error::Error for InvalidPriority {}

/// Task status.
///
/// `Open` is the initial state and `Completed` the only terminal one. See
/// [`crate::tasks::lifecycle`] for the allowed transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    /// Newly created.
    #[default]
    Open,
    /// Acknowledged but not started.
    NotStarted,
    /// Deferred to a later date.
    Postponed,
    /// Being worked on.
    InProgress,
    /// Waiting on someone else.
    WaitingInput,
    /// Closed. No further status changes are allowed.
    Completed,
}

impl Status {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Open,
        Self::NotStarted,
        Self::Postponed,
        Self::InProgress,
        Self::WaitingInput,
        Self::Completed,
    ];

    /// Parse a status from its wire code.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid status.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> std::result::Result<Self, InvalidStatus> {
        let normalized: String =
            s.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>().to_lowercase();
        match normalized.as_str() {
            "open" => Ok(Self::Open),
            "notstarted" => Ok(Self::NotStarted),
            "postponed" => Ok(Self::Postponed),
            "inprogress" => Ok(Self::InProgress),
            "waitinginput" | "waitingoninput" => Ok(Self::WaitingInput),
            "completed" | "complete" => Ok(Self::Completed),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }

    /// Wire code of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::NotStarted => "NotStarted",
            Self::Postponed => "Postponed",
            Self::InProgress => "InProgress",
            Self::WaitingInput => "WaitingInput",
            Self::Completed => "Completed",
        }
    }

    /// Display label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::NotStarted => "Not Started",
            Self::Postponed => "Postponed",
            Self::InProgress => "In Progress",
            Self::WaitingInput => "Waiting on Input",
            Self::Completed => "Completed",
        }
    }

    /// Whether no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid status string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus(pub String);

impl std::fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid status: '{}' (must be one of: Open, NotStarted, Postponed, InProgress, \
             WaitingInput, Completed)",
            self.0
        )
    }
}

impl std::error::Error for InvalidStatus {}

/// The lead or contact a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ParentRef {
    /// A lead.
    Lead(i64),
    /// A contact.
    Contact(i64),
}

impl ParentRef {
    /// The numeric id of the parent.
    #[must_use]
    pub const fn id(self) -> i64 {
        match self {
            Self::Lead(id) | Self::Contact(id) => id,
        }
    }

    /// Wire name of the parent kind.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Lead(_) => "lead",
            Self::Contact(_) => "contact",
        }
    }

    /// Reject parent ids the store could never have assigned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParent`] for a zero or negative id.
    pub fn validate(self) -> Result<Self> {
        if self.id() <= 0 {
            return Err(Error::InvalidParent(format!("{} id {} is not valid", self.kind(), self.id())));
        }
        Ok(self)
    }

    /// Build a parent reference from the pair of optional ids on a task row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParent`] when both ids are set.
    pub fn from_ids(lead_id: Option<i64>, contact_id: Option<i64>) -> Result<Option<Self>> {
        match (lead_id, contact_id) {
            (Some(lead), Some(contact)) => Err(Error::InvalidParent(format!(
                "task cannot belong to both lead {lead} and contact {contact}"
            ))),
            (Some(lead), None) => Self::Lead(lead).validate().map(Some),
            (None, Some(contact)) => Self::Contact(contact).validate().map(Some),
            (None, None) => Ok(None),
        }
    }
}

impl std::fmt::Display for ParentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

/// A task row as stored by the task store.
///
/// `notes` and `attachments` hold the serialized collections; use
/// [`Task::decoded_notes`] and [`Task::decoded_attachments`] for the decoded forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned identifier.
    pub id: i64,
    /// Owning lead, if any.
    pub lead_id: Option<i64>,
    /// Owning contact, if any.
    pub contact_id: Option<i64>,
    /// Short subject line.
    pub subject: String,
    /// Assigned owner.
    pub owner: String,
    /// Priority.
    pub priority: Priority,
    /// Due date as entered, if any.
    pub due_date: Option<String>,
    /// Free-form description.
    pub description: String,
    /// Lifecycle status.
    pub status: Status,
    /// Whether the owner has been notified.
    pub is_notified: bool,
    /// When the task was closed. Set only when entering `Completed`.
    pub closed_at: Option<DateTime<Utc>>,
    /// Notes blob.
    pub notes: Option<String>,
    /// Attachments blob.
    pub attachments: Option<String>,
}

impl Task {
    /// The parent this task's notes belong to.
    ///
    /// Returns `None` for free-standing tasks and for rows that carry both a
    /// lead and a contact id.
    #[must_use]
    pub fn parent_ref(&self) -> Option<ParentRef> {
        match (self.lead_id, self.contact_id) {
            (Some(lead), None) => Some(ParentRef::Lead(lead)),
            (None, Some(contact)) => Some(ParentRef::Contact(contact)),
            _ => None,
        }
    }

    /// Whether the row names both a lead and a contact.
    #[must_use]
    pub const fn has_ambiguous_parent(&self) -> bool {
        self.lead_id.is_some() && self.contact_id.is_some()
    }

    /// Check if the task is closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Decode the notes blob.
    #[must_use]
    pub fn decoded_notes(&self) -> Vec<NoteRecord> {
        self.notes.as_deref().map(|blob| notes::decode(blob, self.id)).unwrap_or_default()
    }

    /// Decode the attachments blob.
    #[must_use]
    pub fn decoded_attachments(&self) -> Vec<AttachmentRecord> {
        attachments::decode(self.attachments.as_deref())
    }
}

/// The fields of a task that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Owning parent, if any.
    pub parent: Option<ParentRef>,
    /// Short subject line.
    pub subject: String,
    /// Assigned owner.
    pub owner: String,
    /// Priority.
    pub priority: Priority,
    /// Due date as entered, if any.
    pub due_date: Option<String>,
    /// Free-form description.
    pub description: String,
    /// Initial notes blob.
    pub notes: Option<String>,
    /// Initial attachments blob.
    pub attachments: Option<String>,
}

impl NewTask {
    /// A new task with only a subject set.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self { subject: subject.into(), ..Self::default() }
    }

    /// Attach the task to a parent.
    #[must_use]
    pub fn with_parent(mut self, parent: ParentRef) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Turn this into a stored task with the given id, status `Open`.
    #[must_use]
    pub fn into_task(self, id: i64) -> Task {
        let (lead_id, contact_id) = match self.parent {
            Some(ParentRef::Lead(lead)) => (Some(lead), None),
            Some(ParentRef::Contact(contact)) => (None, Some(contact)),
            None => (None, None),
        };
        Task {
            id,
            lead_id,
            contact_id,
            subject: self.subject,
            owner: self.owner,
            priority: self.priority,
            due_date: self.due_date,
            description: self.description,
            status: Status::Open,
            is_notified: false,
            closed_at: None,
            notes: self.notes.filter(|n| !n.is_empty()),
            attachments: self.attachments.filter(|a| !a.is_empty()),
        }
    }
}

/// An entry in the audit log of a local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique identifier for the entry.
    pub id: i64,
    /// ISO 8601 timestamp when the operation occurred.
    pub timestamp: String,
    /// Type of operation (`create`, `replace` or `delete`).
    pub operation: String,
    /// ID of the affected task.
    pub task_id: Option<i64>,
    /// Previous row (JSON serialized, if applicable).
    pub old_value: Option<String>,
    /// New row (JSON serialized, if applicable).
    pub new_value: Option<String>,
}

#[cfg(test)]
pub(crate) fn sample_task(id: i64) -> Task {
    NewTask::new(format!("Task {id}")).into_task(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_from_str() {
        assert_eq!(Priority::from_str("low").unwrap(), Priority::Low);
        assert_eq!(Priority::from_str("Normal").unwrap(), Priority::Normal);
        assert_eq!(Priority::from_str("medium").unwrap(), Priority::Normal);
        assert_eq!(Priority::from_str("HIGH").unwrap(), Priority::High);
        assert!(Priority::from_str("urgent").is_err());
    }

    #[test]
    fn test_priority_badge_colors() {
        assert_eq!(Priority::Low.badge_color(), "green");
        assert_eq!(Priority::Normal.badge_color(), "blue");
        assert_eq!(Priority::High.badge_color(), "red");
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_status_from_str() {
        for status in Status::ALL {
            assert_eq!(Status::from_str(status.as_str()).unwrap(), status);
        }
        assert_eq!(Status::from_str("in progress").unwrap(), Status::InProgress);
        assert_eq!(Status::from_str("Not Started").unwrap(), Status::NotStarted);
        assert_eq!(Status::from_str("waiting on input").unwrap(), Status::WaitingInput);
        assert_eq!(Status::from_str("complete").unwrap(), Status::Completed);
        assert!(Status::from_str("closed").is_err());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(Status::NotStarted.label(), "Not Started");
        assert_eq!(Status::WaitingInput.label(), "Waiting on Input");
        assert_eq!(Status::InProgress.to_string(), "InProgress");
    }

    #[test]
    fn test_only_completed_is_terminal() {
        for status in Status::ALL {
            assert_eq!(status.is_terminal(), status == Status::Completed);
        }
    }

    #[test]
    fn test_invalid_status_display() {
        let err = InvalidStatus("foo".to_string());
        assert!(err.to_string().contains("foo"));
        assert!(err.to_string().contains("WaitingInput"));
    }

    #[test]
    fn test_parent_ref_validate() {
        assert!(ParentRef::Lead(1).validate().is_ok());
        assert!(matches!(ParentRef::Contact(0).validate(), Err(Error::InvalidParent(_))));
        assert!(matches!(ParentRef::Lead(-4).validate(), Err(Error::InvalidParent(_))));
    }

    #[test]
    fn test_parent_ref_from_ids() {
        assert_eq!(ParentRef::from_ids(Some(5), None).unwrap(), Some(ParentRef::Lead(5)));
        assert_eq!(ParentRef::from_ids(None, Some(5)).unwrap(), Some(ParentRef::Contact(5)));
        assert_eq!(ParentRef::from_ids(None, None).unwrap(), None);
        assert!(ParentRef::from_ids(Some(1), Some(2)).is_err());
    }

    #[test]
    fn test_task_parent_ref() {
        let mut task = sample_task(1);
        assert_eq!(task.parent_ref(), None);

        task.lead_id = Some(5);
        assert_eq!(task.parent_ref(), Some(ParentRef::Lead(5)));

        task.contact_id = Some(6);
        assert!(task.has_ambiguous_parent());
        assert_eq!(task.parent_ref(), None);

        task.lead_id = None;
        assert_eq!(task.parent_ref(), Some(ParentRef::Contact(6)));
    }

    #[test]
    fn test_new_task_into_task() {
        let task = NewTask::new("Call back").with_parent(ParentRef::Contact(9)).into_task(3);
        assert_eq!(task.id, 3);
        assert_eq!(task.contact_id, Some(9));
        assert_eq!(task.lead_id, None);
        assert_eq!(task.status, Status::Open);
        assert!(!task.is_notified);
        assert!(task.closed_at.is_none());
    }

    #[test]
    fn test_new_task_normalizes_empty_blobs() {
        let mut new = NewTask::new("x");
        new.notes = Some(String::new());
        new.attachments = Some(String::new());
        let task = new.into_task(1);
        assert_eq!(task.notes, None);
        assert_eq!(task.attachments, None);
    }

    #[test]
    fn test_task_decodes_blobs() {
        let mut task = sample_task(2);
        assert!(task.decoded_notes().is_empty());
        assert!(task.decoded_attachments().is_empty());

        task.notes = Some("[a] one (1/1/2024, 1:00:00 AM)".to_string());
        task.attachments = Some("not json".to_string());
        assert_eq!(task.decoded_notes()[0].task_id, 2);
        assert!(task.decoded_attachments().is_empty());
    }

    #[test]
    fn test_task_serialization() {
        let mut task = sample_task(1);
        task.lead_id = Some(4);
        task.closed_at = Some(Utc::now());
        let json = serde_json::to_string(&task).unwrap();
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, task);
    }
}
