//! Attachment blob encoding.
//!
//! Attachments are stored inline on the task as a JSON array of
//! `{id, name, data}` objects, where `data` is a `data:` URI carrying the
//! file as base64. A relational text column is a poor home for binary
//! content, so new attachments are capped at a configurable size
//! ([`DEFAULT_MAX_ATTACHMENT_BYTES`] unless configured otherwise).
//!
//! An absent blob and an empty array mean the same thing: encoding an empty
//! list yields `None`, and both `None` and `"[]"` decode to an empty list.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Default limit on the raw (pre-base64) size of a new attachment: 5 MiB.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

/// MIME type used when the caller does not know one.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// One attachment stored on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// Creation time in milliseconds since the Unix epoch. Stable once stored.
    pub id: i64,
    /// Original file name.
    pub name: String,
    /// `data:<mime>;base64,<payload>` URI.
    pub data: String,
}

impl AttachmentRecord {
    /// Build an attachment from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentTooLarge`] if `bytes` exceeds `max_bytes`.
    pub fn from_bytes(
        id: i64,
        name: &str,
        mime_type: Option<&str>,
        bytes: &[u8],
        max_bytes: usize,
    ) -> Result<Self> {
        if bytes.len() > max_bytes {
            return Err(Error::AttachmentTooLarge {
                name: name.to_string(),
                size: bytes.len(),
                limit: max_bytes,
            });
        }

        let mime = mime_type.filter(|m| !m.trim().is_empty()).unwrap_or(FALLBACK_MIME_TYPE);
        Ok(Self {
            id,
            name: name.to_string(),
            data: format!("data:{mime};base64,{}", BASE64.encode(bytes)),
        })
    }

    /// The MIME type declared in the data URI, if it has one.
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        let (header, _) = self.data.strip_prefix("data:")?.split_once(',')?;
        let mime = header.split(';').next().unwrap_or_default();
        (!mime.is_empty()).then_some(mime)
    }

    /// Decode the payload carried by the data URI.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAttachment`] if `data` is not a base64 data URI.
    pub fn payload(&self) -> Result<Vec<u8>> {
        let rest = self
            .data
            .strip_prefix("data:")
            .ok_or_else(|| Error::InvalidAttachment(format!("{}: not a data URI", self.name)))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::InvalidAttachment(format!("{}: missing payload", self.name)))?;
        if !header.split(';').any(|part| part == "base64") {
            return Err(Error::InvalidAttachment(format!("{}: payload is not base64", self.name)));
        }
        BASE64
            .decode(payload.trim())
            .map_err(|e| Error::InvalidAttachment(format!("{}: {e}", self.name)))
    }
}

/// Encode a list of attachments, or `None` when the list is empty.
#[must_use]
pub fn encode(records: &[AttachmentRecord]) -> Option<String> {
    if records.is_empty() {
        return None;
    }
    match serde_json::to_string(records) {
        Ok(json) => Some(json),
        Err(e) => {
            // Plain structs of strings and integers always serialize.
            tracing::error!(error = %e, "failed to serialize attachments");
            None
        }
    }
}

/// Decode an attachments blob.
///
/// Never fails: unparseable blobs and non-array JSON decode to an empty
/// list, and array elements of the wrong shape are skipped. Both cases are
/// logged as warnings.
#[must_use]
pub fn decode(blob: Option<&str>) -> Vec<AttachmentRecord> {
    let Some(blob) = blob.map(str::trim).filter(|b| !b.is_empty()) else {
        return Vec::new();
    };

    let value: serde_json::Value = match serde_json::from_str(blob) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "attachments blob is not valid JSON; treating as empty");
            return Vec::new();
        }
    };

    let serde_json::Value::Array(items) = value else {
        tracing::warn!("attachments blob is not a JSON array; treating as empty");
        return Vec::new();
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping malformed attachment entry");
                None
            }
        })
        .collect()
}

/// Drop the attachment with the given id.
#[must_use]
pub fn remove(records: Vec<AttachmentRecord>, id: i64) -> Vec<AttachmentRecord> {
    records.into_iter().filter(|r| r.id != id).collect()
}
