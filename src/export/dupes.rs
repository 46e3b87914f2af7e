//! Tab-separated audit log of duplicate messages.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{BunchError, Result};
use crate::model::message::MessageRecord;

/// Header row of the audit log.
pub const DUPES_HEADER: &str = "Message-ID\tFrom\tSubject\tTime\tFilename";

/// Writes one row per duplicate: identity, sender, subject, time, file name.
pub struct DupesLog<W: Write> {
    out: W,
    rows: u64,
}

impl DupesLog<BufWriter<File>> {
    /// Create (or truncate) the log file at `path` and write the header row.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| BunchError::io(path, e))?;
        Self::new(BufWriter::new(file)).map_err(|e| BunchError::io(path, e))
    }
}

impl<W: Write> DupesLog<W> {
    /// Wrap any writer and write the header row.
    pub fn new(mut out: W) -> std::io::Result<Self> {
        writeln!(out, "{DUPES_HEADER}")?;
        Ok(Self { out, rows: 0 })
    }

    /// Append a row for a duplicate record.
    pub fn record(&mut self, msg: &MessageRecord) -> std::io::Result<()> {
        writeln!(
            self.out,
            "{}\t{}\t{}\t{}\t{}",
            tsv_field(&msg.id),
            tsv_field(&msg.from),
            tsv_field(&msg.subject),
            msg.timestamp.to_rfc3339(),
            tsv_field(&msg.file_name()),
        )?;
        self.rows += 1;
        Ok(())
    }

    /// Number of rows written, excluding the header.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> std::io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Keep a field on one line and inside its column.
fn tsv_field(value: &str) -> String {
    value.replace(['\t', '\r', '\n'], " ")
}
