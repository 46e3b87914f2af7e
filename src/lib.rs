//! `mailbunch`: bunch scattered maildirs into one de-duplicated maildir.
//!
//! This crate provides the library behind the CLI: loading maildir
//! messages, resolving their timestamp and identity, de-duplicating and
//! classifying them into Inbox, Sent and Archive, and writing the result
//! under fresh, collision-free file names.

pub mod config;
pub mod error;
pub mod export;
pub mod index;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod resolve;
pub mod store;
