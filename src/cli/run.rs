//! CLI command execution.

use super::{AttachCommand, Cli, Command, NotesCommand, TaskCommand};
use crate::codec::AttachmentRecord;
use crate::config::{Backend, Config};
use crate::error::{Error, Result};
use crate::tasks::{NewTask, ParentRef, Priority, Status, TaskService, TaskStore};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

/// Output of a CLI command.
#[derive(Debug)]
pub struct CliOutput {
    /// Exit code for the process.
    pub exit_code: ExitCode,
    /// Messages to print to stdout.
    pub stdout: Vec<String>,
    /// Messages to print to stderr.
    pub stderr: Vec<String>,
}

impl CliOutput {
    fn success(stdout: String) -> Self {
        Self { exit_code: ExitCode::SUCCESS, stdout: vec![stdout], stderr: vec![] }
    }

    fn failure(error: &Error) -> Self {
        // 2 for rejected requests, 1 for failures talking to the store
        let code = if error.is_store_failure() { 1 } else { 2 };
        Self { exit_code: ExitCode::from(code), stdout: vec![], stderr: vec![format!("Error: {error}")] }
    }
}

/// Attachment metadata shown by `attach list`.
#[derive(Debug, Serialize)]
struct AttachmentSummary<'a> {
    id: i64,
    name: &'a str,
    mime_type: Option<&'a str>,
    encoded_len: usize,
}

impl<'a> From<&'a AttachmentRecord> for AttachmentSummary<'a> {
    fn from(record: &'a AttachmentRecord) -> Self {
        Self {
            id: record.id,
            name: &record.name,
            mime_type: record.mime_type(),
            encoded_len: record.data.len(),
        }
    }
}

/// Run a parsed command line.
pub fn run(cli: Cli) -> CliOutput {
    if matches!(cli.command, Command::Version) {
        return CliOutput::success(format!("crm-notes v{}", crate::VERSION));
    }

    match dispatch(&cli.dir, cli.command) {
        Ok(output) => CliOutput::success(output),
        Err(e) => CliOutput::failure(&e),
    }
}

fn dispatch(base_dir: &Path, command: Command) -> Result<String> {
    let config = Config::resolve(base_dir)?;
    config.validate()?;

    match config.backend {
        Backend::Http => {
            let service = TaskService::new(config.http_store()?)
                .with_max_attachment_bytes(config.max_attachment_bytes);
            execute(&service, command)
        }
        Backend::Sqlite => {
            let service = TaskService::new(config.sqlite_store(base_dir)?)
                .with_max_attachment_bytes(config.max_attachment_bytes);
            execute(&service, command)
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn execute<S: TaskStore>(service: &TaskService<S>, command: Command) -> Result<String> {
    match command {
        Command::Notes(cmd) => run_notes_cmd(service, cmd),
        Command::Attach(cmd) => run_attach_cmd(service, cmd),
        Command::Task(cmd) => run_task_cmd(service, cmd),
        Command::Timeline(parent) => {
            let parent = ParentRef::from_ids(parent.lead, parent.contact)?
                .ok_or_else(|| Error::InvalidParent("pass --lead or --contact".to_string()))?;
            to_json(&service.timeline(parent)?)
        }
        Command::Version => Ok(format!("crm-notes v{}", crate::VERSION)),
    }
}

fn run_notes_cmd<S: TaskStore>(service: &TaskService<S>, cmd: NotesCommand) -> Result<String> {
    let notes = match cmd {
        NotesCommand::List { task } => service.notes(task)?,
        NotesCommand::Add { task, text, source } => service.add_note(task, source.as_deref(), &text)?,
        NotesCommand::Edit { task, note, text } => service.edit_note(task, &note, &text)?,
        NotesCommand::Rm { task, note } => service.delete_note(task, &note)?,
    };
    to_json(&notes)
}

fn run_attach_cmd<S: TaskStore>(service: &TaskService<S>, cmd: AttachCommand) -> Result<String> {
    match cmd {
        AttachCommand::List { task } => {
            let list = service.attachments(task)?;
            to_json(&list.iter().map(AttachmentSummary::from).collect::<Vec<_>>())
        }
        AttachCommand::Add { task, path, name, mime } => {
            let bytes = std::fs::read(&path)?;
            let name = name.unwrap_or_else(|| {
                path.file_name().map_or_else(
                    || path.display().to_string(),
                    |n| n.to_string_lossy().into_owned(),
                )
            });
            let stored = service.add_attachment(task, &name, mime.as_deref(), &bytes)?;
            to_json(&AttachmentSummary::from(&stored))
        }
        AttachCommand::Rm { task, id } => {
            let list = service.remove_attachment(task, id)?;
            to_json(&list.iter().map(AttachmentSummary::from).collect::<Vec<_>>())
        }
        AttachCommand::Save { task, id, out } => {
            let list = service.attachments(task)?;
            let record = list.iter().find(|a| a.id == id).ok_or(Error::AttachmentNotFound(id))?;
            let bytes = record.payload()?;
            std::fs::write(&out, &bytes)?;
            Ok(format!("wrote {} bytes to {}", bytes.len(), out.display()))
        }
    }
}

fn run_task_cmd<S: TaskStore>(service: &TaskService<S>, cmd: TaskCommand) -> Result<String> {
    match cmd {
        TaskCommand::Show { id } => to_json(&service.get_task(id)?),
        TaskCommand::Create { subject, owner, priority, parent } => {
            let priority = Priority::from_str(&priority)?;
            let task = NewTask {
                parent: ParentRef::from_ids(parent.lead, parent.contact)?,
                subject,
                owner,
                priority,
                ..NewTask::default()
            };
            to_json(&service.create_task(task)?)
        }
        TaskCommand::Status { id, status } => {
            let status = Status::from_str(&status)?;
            to_json(&service.set_status(id, status)?)
        }
        TaskCommand::Close { id } => to_json(&service.close_task(id)?),
        TaskCommand::Notify { id } => to_json(&service.mark_notified(id)?),
        TaskCommand::Delete { id } => {
            service.delete_task(id)?;
            Ok(format!("deleted task {id}"))
        }
    }
}
