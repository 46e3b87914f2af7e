//! Core data model: message records, source roles, and output buckets.

pub mod bucket;
pub mod message;
