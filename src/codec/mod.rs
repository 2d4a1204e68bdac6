//! Text encodings for the collections stored inside a task row.
//!
//! - [`notes`]: newline-joined `[source] text (timestamp)` lines
//! - [`attachments`]: a JSON array of base64 data-URI attachments
//! - [`timestamp`]: the locale-formatted timestamps used by note lines

pub mod attachments;
pub mod notes;
pub mod timestamp;

pub use attachments::{AttachmentRecord, DEFAULT_MAX_ATTACHMENT_BYTES};
pub use notes::{NoteRecord, NoteSource, UNSPECIFIED_SOURCE};
pub use timestamp::{format_timestamp, now_timestamp, parse_timestamp};
