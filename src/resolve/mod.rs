//! Derived message fields: canonical timestamp and canonical identity.

pub mod identity;
pub mod timestamp;
