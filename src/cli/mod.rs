//! Command-line interface for crm-notes.
//!
//! Commands are grouped by what they touch: `notes`, `attach`, `task`, and
//! `timeline`. Results are printed as JSON on stdout; errors go to stderr.

mod run;


pub use run::{run, CliOutput};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Manage notes, attachments and status of CRM tasks.
#[derive(Parser, Debug)]
#[command(name = "crm-notes")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding crm-notes.yaml
    #[arg(long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Notes stored on a task.
    #[command(subcommand)]
    Notes(NotesCommand),

    /// Attachments stored on a task.
    #[command(subcommand)]
    Attach(AttachCommand),

    /// Task status and lifecycle.
    #[command(subcommand)]
    Task(TaskCommand),

    /// All notes of a lead or contact, newest first.
    Timeline(ParentArgs),

    /// Show version information.
    Version,
}

/// Note commands.
#[derive(Subcommand, Debug, Clone)]
pub enum NotesCommand {
    /// List a task's notes.
    List {
        /// Task ID
        task: i64,
    },

    /// Append a note stamped with the current time.
    Add {
        /// Task ID
        task: i64,
        /// Note text
        text: String,
        /// Provenance shown before the note (default: "Task - <subject>")
        #[arg(long)]
        source: Option<String>,
    },

    /// Replace the text of a note.
    Edit {
        /// Task ID
        task: i64,
        /// Note ID as shown by `notes list`
        note: String,
        /// New text
        text: String,
    },

    /// Remove a note.
    Rm {
        /// Task ID
        task: i64,
        /// Note ID as shown by `notes list`
        note: String,
    },
}

/// Attachment commands.
#[derive(Subcommand, Debug, Clone)]
pub enum AttachCommand {
    /// List a task's attachments (without payloads).
    List {
        /// Task ID
        task: i64,
    },

    /// Attach a file.
    Add {
        /// Task ID
        task: i64,
        /// File to attach
        path: PathBuf,
        /// Name to store (default: the file name)
        #[arg(long)]
        name: Option<String>,
        /// MIME type (default: application/octet-stream)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Remove an attachment.
    Rm {
        /// Task ID
        task: i64,
        /// Attachment ID
        id: i64,
    },

    /// Write an attachment's payload to a file.
    Save {
        /// Task ID
        task: i64,
        /// Attachment ID
        id: i64,
        /// Output path
        out: PathBuf,
    },
}

/// Task commands.
#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    /// Show a task.
    Show {
        /// Task ID
        id: i64,
    },

    /// Create a task.
    Create {
        /// Subject line
        #[arg(short, long)]
        subject: String,
        /// Owner
        #[arg(short, long, default_value = "")]
        owner: String,
        /// Priority: low, normal or high
        #[arg(short, long, default_value = "normal")]
        priority: String,
        /// Parent lead or contact
        #[command(flatten)]
        parent: OptionalParentArgs,
    },

    /// Change a task's status. Moving to Completed closes it.
    Status {
        /// Task ID
        id: i64,
        /// New status (Open, NotStarted, Postponed, InProgress, WaitingInput, Completed)
        status: String,
    },

    /// Close a task.
    Close {
        /// Task ID
        id: i64,
    },

    /// Mark a task's owner as notified.
    Notify {
        /// Task ID
        id: i64,
    },

    /// Delete a task with its notes and attachments.
    Delete {
        /// Task ID
        id: i64,
    },
}

/// Exactly one parent reference.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ParentArgs {
    /// Lead ID
    #[arg(long)]
    pub lead: Option<i64>,
    /// Contact ID
    #[arg(long)]
    pub contact: Option<i64>,
}

/// At most one parent reference.
#[derive(Args, Debug, Clone)]
#[group(required = false, multiple = false)]
pub struct OptionalParentArgs {
    /// Lead ID
    #[arg(long)]
    pub lead: Option<i64>,
    /// Contact ID
    #[arg(long)]
    pub contact: Option<i64>,
}
