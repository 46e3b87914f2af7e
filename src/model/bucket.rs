//! Source roles and classification buckets.

use std::fmt;

/// Which kind of maildir a message was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceRole {
    Inbox,
    Archive,
}

/// One of the three output categories. Every record lands in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Inbox,
    Sent,
    Archive,
}

impl Bucket {
    /// All buckets, in the order they are written out.
    pub const ALL: [Bucket; 3] = [Bucket::Inbox, Bucket::Sent, Bucket::Archive];

    /// Name of the bucket's subtree under the output root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Bucket::Inbox => "Inbox",
            Bucket::Sent => "Sent",
            Bucket::Archive => "Archive",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
