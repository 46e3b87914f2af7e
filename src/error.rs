//! Centralized error types for mailbunch.
//!
//! Only environment and configuration faults are errors. Header anomalies
//! (missing Message-ID, unparseable dates or senders) are recorded on the
//! message itself and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailbunch library.
#[derive(Error, Debug)]
pub enum BunchError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A message file name has no `:2,` info suffix.
    #[error("No ':2,' flags suffix in message file name: {0}")]
    MissingFlagsSuffix(PathBuf),

    /// The file could not be parsed as an RFC 5322 message.
    #[error("File does not look like a mail message: {0}")]
    InvalidMessage(PathBuf),

    /// A directory was found where only message files are expected.
    #[error("Unexpected directory inside a maildir folder: {0}")]
    UnexpectedDirectory(PathBuf),

    /// The sequence issuer stopped handing out numbers.
    #[error("Sequence issuer is no longer running")]
    SequenceClosed,

    /// The merged settings are unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The user declined the confirmation prompt.
    #[error("Operation cancelled by user")]
    Cancelled,
}

/// Convenience alias for `Result<T, BunchError>`.
pub type Result<T> = std::result::Result<T, BunchError>;

impl BunchError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
