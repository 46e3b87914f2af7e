//! Output: the consolidated maildir writer and the duplicates audit log.

pub mod dupes;
pub mod maildir;
