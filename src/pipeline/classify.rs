//! Bucket assignment by sender identity and source role.

use crate::model::bucket::{Bucket, SourceRole};
use crate::model::message::MessageRecord;

/// The user's own sender addresses, matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct Identities {
    addresses: Vec<String>,
}

impl Identities {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let addresses = addresses
            .into_iter()
            .map(|a| a.as_ref().trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        Self { addresses }
    }

    /// Whether `from` is one of the configured identities.
    pub fn matches(&self, from: &str) -> bool {
        let from = from.trim().to_lowercase();
        !from.is_empty() && self.addresses.contains(&from)
    }
}

/// Sent if the sender is one of `identities`, otherwise by source role.
pub fn classify(record: &MessageRecord, role: SourceRole, identities: &Identities) -> Bucket {
    if identities.matches(&record.from) {
        return Bucket::Sent;
    }
    match role {
        SourceRole::Archive => Bucket::Archive,
        SourceRole::Inbox => Bucket::Inbox,
    }
}
