//! Message loader: turns one maildir file into a [`MessageRecord`].

use std::path::Path;

use mail_parser::MessageParser;
use tracing::{info, warn};

use crate::error::{BunchError, Result};
use crate::model::message::{file_name_of, MessageRecord};
use crate::parser::header::{self, RawHeaders};
use crate::resolve::identity::resolve_identity;
use crate::resolve::timestamp::{resolve_timestamp, TimeSource};

/// Maildir info delimiter separating the unique name from the flags.
pub const FLAGS_DELIMITER: &str = ":2,";

/// Load a message file.
///
/// Unreadable files, names without a `:2,` suffix, and content with no
/// header fields at all are hard errors. Missing or malformed headers are
/// not: they are recorded on the returned record.
pub fn load_message(path: impl AsRef<Path>, domain: &str) -> Result<MessageRecord> {
    let path = path.as_ref();
    let flags = flags_from_file_name(path)?;

    let data = std::fs::read(path).map_err(|e| BunchError::io(path, e))?;

    let header_end = header::find_header_end(&data).unwrap_or(data.len());
    let headers = RawHeaders::parse(&data[..header_end]);
    if headers.is_empty() {
        return Err(BunchError::InvalidMessage(path.to_path_buf()));
    }

    let time = resolve_timestamp(&headers, path);

    let identity = resolve_identity(headers.first("message-id"), &data, domain);
    if identity.synthetic {
        info!(
            path = %path.display(),
            id = %identity.id,
            "No Message-ID, synthesized one from content"
        );
    }

    // Subject and From need only the header block, not the MIME body.
    let parsed = MessageParser::default().parse(header::header_block(&data));

    let subject = parsed
        .as_ref()
        .and_then(|m| m.subject())
        .map(str::to_string)
        .or_else(|| headers.first("subject").map(str::to_string))
        .unwrap_or_default();

    let from = parsed
        .as_ref()
        .and_then(|m| m.from())
        .and_then(|a| a.first())
        .and_then(|addr| addr.address.as_deref())
        .map(str::trim)
        .filter(|a| a.contains('@'))
        .map(str::to_string)
        .unwrap_or_default();

    if from.is_empty() && headers.first("from").is_some() {
        warn!(path = %path.display(), "Could not parse From address, treating as empty");
    }

    Ok(MessageRecord {
        id: identity.id,
        timestamp: time.instant,
        subject,
        from,
        flags,
        source_path: path.to_path_buf(),
        is_duplicate: false,
        has_synthetic_id: identity.synthetic,
        has_no_timestamp: time.source == TimeSource::Epoch,
    })
}

/// Flag characters following `:2,` in the file name.
pub fn flags_from_file_name(path: &Path) -> Result<String> {
    let name = file_name_of(path);
    let (_, rest) = name
        .split_once(FLAGS_DELIMITER)
        .ok_or_else(|| BunchError::MissingFlagsSuffix(path.to_path_buf()))?;
    let flags = rest.split(FLAGS_DELIMITER).next().unwrap_or_default();
    Ok(flags.to_string())
}
