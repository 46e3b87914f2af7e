//! Corpus-wide duplicate detection by canonical message identity.

use std::collections::HashSet;

/// Identities seen so far in one run. First writer wins.
///
/// Which copy counts as the original follows directory traversal order.
#[derive(Debug, Default)]
pub struct DedupIndex {
    seen: HashSet<String>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` as seen. Returns `true` if it had already been seen.
    pub fn observe(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return true;
        }
        self.seen.insert(id.to_string());
        false
    }

    /// Number of distinct identities observed.
    pub(crate) fn len(&self) -> usize {
        self.seen.len()
    }
}
