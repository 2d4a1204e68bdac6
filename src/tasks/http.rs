//! REST-backed task store.
//!
//! The backend reads tasks as lowerCamel JSON (`leadId`, `isNotified`) but
//! expects writes in UpperCamel (`LeadId`, `IsNotified`). Both shapes live in
//! this module as DTOs; nothing outside it sees either casing.
//!
//! Reads are retried on transport errors and 5xx responses. Writes are sent
//! exactly once: a failed write is reported and left to the caller.

use crate::error::{Error, Result};
use crate::tasks::models::{NewTask, ParentRef, Priority, Status, Task};
use crate::tasks::store::TaskStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A task as the backend returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReadDto {
    id: i64,
    #[serde(default)]
    lead_id: Option<i64>,
    #[serde(default)]
    contact_id: Option<i64>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    is_notified: Option<bool>,
    #[serde(default)]
    closed_at: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    attachments: Option<String>,
}

impl TryFrom<TaskReadDto> for Task {
    type Error = Error;

    /// Unknown status or priority names are refused rather than guessed: a
    /// guessed value would be written back on the next replace.
    fn try_from(dto: TaskReadDto) -> Result<Self> {
        let id = dto.id;
        let unreadable = move |e: &dyn std::fmt::Display| Error::Store {
            message: format!("task {id} in the response is unreadable: {e}"),
        };
        let status = match dto.status.as_deref() {
            None => Status::Open,
            Some(raw) => Status::from_str(raw).map_err(|e| unreadable(&e))?,
        };
        let priority = match dto.priority.as_deref() {
            None => Priority::default(),
            Some(raw) => Priority::from_str(raw).map_err(|e| unreadable(&e))?,
        };

        Ok(Self {
            id: dto.id,
            lead_id: dto.lead_id,
            contact_id: dto.contact_id,
            subject: dto.subject.unwrap_or_default(),
            owner: dto.owner.unwrap_or_default(),
            priority,
            due_date: dto.due_date,
            description: dto.description.unwrap_or_default(),
            status,
            is_notified: dto.is_notified.unwrap_or(false),
            closed_at: dto.closed_at.as_deref().and_then(parse_closed_at),
            notes: dto.notes.filter(|n| !n.is_empty()),
            attachments: dto.attachments.filter(|a| !a.is_empty()),
        })
    }
}

fn parse_closed_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc())
        })
        .ok()
}

/// A task as the backend accepts it on `POST` and `PUT`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskWriteDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    lead_id: Option<i64>,
    contact_id: Option<i64>,
    subject: String,
    owner: String,
    priority: &'static str,
    due_date: Option<String>,
    description: String,
    status: &'static str,
    is_notified: bool,
    closed_at: Option<String>,
    notes: Option<String>,
    attachments: Option<String>,
}

impl From<&Task> for TaskWriteDto {
    fn from(task: &Task) -> Self {
        Self {
            id: Some(task.id),
            lead_id: task.lead_id,
            contact_id: task.contact_id,
            subject: task.subject.clone(),
            owner: task.owner.clone(),
            priority: task.priority.as_str(),
            due_date: task.due_date.clone(),
            description: task.description.clone(),
            status: task.status.as_str(),
            is_notified: task.is_notified,
            closed_at: task.closed_at.map(|dt| dt.to_rfc3339()),
            notes: task.notes.clone(),
            attachments: task.attachments.clone(),
        }
    }
}

impl From<NewTask> for TaskWriteDto {
    fn from(task: NewTask) -> Self {
        let mut dto = Self::from(&task.into_task(0));
        dto.id = None;
        dto
    }
}

/// Task store speaking to the CRM REST API.
#[derive(Debug, Clone)]
pub struct HttpTaskStore {
    base_url: String,
    agent: ureq::Agent,
    read_retries: u32,
}

impl HttpTaskStore {
    /// Create a store for the API rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration, read_retries: u32) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { base_url: base_url.trim_end_matches('/').to_string(), agent, read_retries }
    }

    /// The API root this store talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    fn task_url(&self, id: i64) -> String {
        format!("{}/tasks/{id}", self.base_url)
    }

    /// Run an idempotent request, retrying transient failures.
    fn with_read_retries<T>(
        &self,
        what: &str,
        mut request: impl FnMut() -> std::result::Result<T, ureq::Error>,
    ) -> std::result::Result<T, ureq::Error> {
        let mut attempt = 0;
        loop {
            match request() {
                Err(e) if attempt < self.read_retries && is_transient(&e) => {
                    attempt += 1;
                    tracing::warn!(what, attempt, error = %e, "retrying store read");
                    std::thread::sleep(Duration::from_millis(100 * u64::from(attempt)));
                }
                other => return other,
            }
        }
    }
}

fn is_transient(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Status(code, _) => *code >= 500,
        ureq::Error::Transport(_) => true,
    }
}

/// Map a ureq failure into the crate's store errors.
fn store_error(err: ureq::Error) -> Error {
    match err {
        ureq::Error::Status(status, response) => {
            let message = response
                .into_string()
                .ok()
                .filter(|body| !body.trim().is_empty())
                .unwrap_or_else(|| "no response body".to_string());
            Error::Http { status, message }
        }
        ureq::Error::Transport(transport) => Error::Store { message: transport.to_string() },
    }
}

fn read_json<T: serde::de::DeserializeOwned>(response: ureq::Response) -> Result<T> {
    response
        .into_json()
        .map_err(|e| Error::Store { message: format!("unreadable response: {e}") })
}

impl TaskStore for HttpTaskStore {
    fn get_task(&self, id: i64) -> Result<Option<Task>> {
        tracing::debug!(task_id = id, "GET task");
        let url = self.task_url(id);
        match self.with_read_retries("get_task", || self.agent.get(&url).call()) {
            Ok(response) => Ok(Some(Task::try_from(read_json::<TaskReadDto>(response)?)?)),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(store_error(e)),
        }
    }

    fn list_tasks_by_parent(&self, parent: ParentRef) -> Result<Vec<Task>> {
        tracing::debug!(%parent, "GET tasks by parent");
        let url = self.tasks_url();
        let parent_id = parent.id().to_string();
        let response = self
            .with_read_retries("list_tasks_by_parent", || {
                self.agent
                    .get(&url)
                    .query("parentId", &parent_id)
                    .query("parentKind", parent.kind())
                    .call()
            })
            .map_err(store_error)?;
        let dtos: Vec<TaskReadDto> = read_json(response)?;
        dtos.into_iter().map(Task::try_from).collect()
    }

    fn create_task(&self, task: NewTask) -> Result<Task> {
        tracing::debug!(subject = %task.subject, "POST task");
        let response = self
            .agent
            .post(&self.tasks_url())
            .send_json(TaskWriteDto::from(task))
            .map_err(store_error)?;
        Task::try_from(read_json::<TaskReadDto>(response)?)
    }

    fn replace_task(&self, task: &Task) -> Result<Task> {
        tracing::debug!(task_id = task.id, "PUT task");
        match self.agent.put(&self.task_url(task.id)).send_json(TaskWriteDto::from(task)) {
            Ok(response) => {
                // Some deployments answer 204 with no body; the row is what we sent.
                if response.status() == 204 {
                    return Ok(task.clone());
                }
                Task::try_from(read_json::<TaskReadDto>(response)?)
            }
            Err(ureq::Error::Status(404, _)) => Err(Error::TaskNotFound(task.id)),
            Err(e) => Err(store_error(e)),
        }
    }

    fn delete_task(&self, id: i64) -> Result<bool> {
        tracing::debug!(task_id = id, "DELETE task");
        match self.agent.delete(&self.task_url(id)).call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(404, _)) => Ok(false),
            Err(e) => Err(store_error(e)),
        }
    }
}
