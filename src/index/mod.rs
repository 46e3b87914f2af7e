//! Run-scoped indexes over loaded messages.

pub mod dedup;
