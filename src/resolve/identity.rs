//! Canonical message identity.

use sha2::{Digest, Sha256};

/// Result of identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    pub id: String,
    /// True when the id was derived from the file content.
    pub synthetic: bool,
}

/// Use the trimmed `Message-ID` value, or synthesize `<sha256>@<domain>`
/// from the raw file content when it is absent or blank.
pub fn resolve_identity(raw_message_id: Option<&str>, content: &[u8], domain: &str) -> ResolvedId {
    let trimmed = raw_message_id.map(trim_message_id).unwrap_or_default();
    if !trimmed.is_empty() {
        return ResolvedId {
            id: trimmed.to_string(),
            synthetic: false,
        };
    }

    ResolvedId {
        id: synthetic_id(content, domain),
        synthetic: true,
    }
}

/// Deterministic identity for a message without a `Message-ID`.
///
/// Byte-identical files always get the same id.
pub fn synthetic_id(content: &[u8], domain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}@{domain}", hasher.finalize())
}

fn trim_message_id(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '<' || c == '>')
}
