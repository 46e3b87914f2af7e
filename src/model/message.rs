//! The message record carried through the ingestion pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Metadata for one on-disk message file.
///
/// The record only references the source file; the bytes are copied
/// verbatim by the output writer and never held in memory.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    /// Canonical identity: the trimmed `Message-ID` header, or a
    /// `<sha256>@<domain>` value synthesized from the file content.
    pub id: String,

    /// Resolved handling time. Unix epoch when no header yields a date.
    pub timestamp: DateTime<Utc>,

    /// Decoded `Subject` header (may be empty).
    pub subject: String,

    /// Bare sender address from the `From` header (empty when unparseable).
    pub from: String,

    /// Maildir flag characters taken verbatim from the `:2,` suffix.
    pub flags: String,

    /// Path of the originating file.
    pub source_path: PathBuf,

    /// Another record with the same `id` was loaded earlier in this run.
    pub is_duplicate: bool,

    /// The `id` was synthesized because the message had no `Message-ID`.
    pub has_synthetic_id: bool,

    /// No usable date header was found; `timestamp` is the epoch.
    pub has_no_timestamp: bool,
}

impl MessageRecord {
    /// File name of the source message, lossily decoded.
    pub fn file_name(&self) -> String {
        file_name_of(&self.source_path)
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
