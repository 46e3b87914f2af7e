//! Filesystem primitives for reading and writing maildirs.

pub mod maildir;
