//! Message parsing: header block decoding and the maildir file loader.

pub mod header;
pub mod message;
