//! The bunching pipeline.
//!
//! Ingestion is sequential: every input maildir is read folder by folder,
//! each message is loaded, checked against the dedup index, and classified
//! into a bucket. Once all inputs are consumed the buckets are drained to
//! the output tree, drawing one sequence number per written file.

pub mod classify;
pub mod sequence;

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::RunSettings;
use crate::error::{BunchError, Result};
use crate::export::dupes::DupesLog;
use crate::export::maildir;
use crate::index::dedup::DedupIndex;
use crate::model::bucket::{Bucket, SourceRole};
use crate::model::message::MessageRecord;
use crate::parser::message::load_message;
use crate::store::maildir::{list_messages, reset_output_tree, SUBDIRS};

use classify::{classify, Identities};
use sequence::SequenceIssuer;

/// Emit a progress log line every this many messages.
const LOG_EVERY: u64 = 1000;

/// Progress hooks for the two long phases. Defaults ignore everything.
pub trait Progress {
    /// `total` messages have been read so far.
    fn read(&self, _total: u64) {}
    /// `done` of `total` records in `bucket` have been handled.
    fn write(&self, _bucket: Bucket, _done: usize, _total: usize) {}
}

/// A [`Progress`] that reports nothing.
pub struct NoProgress;

impl Progress for NoProgress {}

/// The three classification buckets, in ingestion order.
#[derive(Debug, Default)]
pub struct Buckets {
    inbox: Vec<MessageRecord>,
    sent: Vec<MessageRecord>,
    archive: Vec<MessageRecord>,
}

impl Buckets {
    pub fn get(&self, bucket: Bucket) -> &[MessageRecord] {
        match bucket {
            Bucket::Inbox => &self.inbox,
            Bucket::Sent => &self.sent,
            Bucket::Archive => &self.archive,
        }
    }

    fn push(&mut self, bucket: Bucket, record: MessageRecord) {
        match bucket {
            Bucket::Inbox => self.inbox.push(record),
            Bucket::Sent => self.sent.push(record),
            Bucket::Archive => self.archive.push(record),
        }
    }

    /// Records across all buckets.
    pub fn total(&self) -> usize {
        self.inbox.len() + self.sent.len() + self.archive.len()
    }
}

/// Counters collected while reading.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub total: u64,
    /// Distinct identities among all messages read.
    pub unique: u64,
    pub duplicates: u64,
    pub no_timestamp: u64,
    pub no_id: u64,
}

/// Run-scoped ingestion state: dedup index, buckets, counters, audit log.
pub struct Ingest<W: Write> {
    domain: String,
    identities: Identities,
    dedup: DedupIndex,
    buckets: Buckets,
    stats: IngestStats,
    dupes: DupesLog<W>,
}

impl<W: Write> Ingest<W> {
    pub fn new(domain: impl Into<String>, identities: Identities, dupes: DupesLog<W>) -> Self {
        Self {
            domain: domain.into(),
            identities,
            dedup: DedupIndex::new(),
            buckets: Buckets::default(),
            stats: IngestStats::default(),
            dupes,
        }
    }

    /// Read the `new`, `cur` and `tmp` folders of a maildir, in that order.
    pub fn ingest_maildir(
        &mut self,
        root: &Path,
        role: SourceRole,
        progress: &dyn Progress,
    ) -> Result<u64> {
        let before = self.stats.total;
        for sub in SUBDIRS {
            self.ingest_dir(&root.join(sub), role, progress)?;
        }
        let count = self.stats.total - before;
        info!(path = %root.display(), role = ?role, count, "Read maildir");
        Ok(count)
    }

    /// Read every message file in one folder.
    pub fn ingest_dir(&mut self, dir: &Path, role: SourceRole, progress: &dyn Progress) -> Result<u64> {
        let paths = list_messages(dir)?;
        for path in &paths {
            self.ingest_file(path, role)?;
            progress.read(self.stats.total);
        }
        Ok(paths.len() as u64)
    }

    /// Load, de-duplicate and classify a single message file.
    pub fn ingest_file(&mut self, path: &Path, role: SourceRole) -> Result<Bucket> {
        let mut record = load_message(path, &self.domain)?;

        self.stats.total += 1;
        if self.stats.total % LOG_EVERY == 0 {
            info!(count = self.stats.total, "Read messages");
        }

        if self.dedup.observe(&record.id) {
            record.is_duplicate = true;
            self.stats.duplicates += 1;
            self.dupes
                .record(&record)
                .map_err(|e| BunchError::io("<dupes log>", e))?;
        }
        if record.has_no_timestamp {
            self.stats.no_timestamp += 1;
        }
        if record.has_synthetic_id {
            self.stats.no_id += 1;
        }

        let bucket = classify(&record, role, &self.identities);
        self.buckets.push(bucket, record);
        Ok(bucket)
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            unique: self.dedup.len() as u64,
            ..self.stats
        }
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    /// End ingestion: flush the audit log and hand back the buckets.
    pub fn finish(self) -> Result<(Buckets, IngestStats, W)> {
        let stats = self.stats();
        let Ingest { buckets, dupes, .. } = self;
        debug!(rows = dupes.rows(), "Closing duplicates log");
        let out = dupes
            .finish()
            .map_err(|e| BunchError::io("<dupes log>", e))?;
        Ok((buckets, stats, out))
    }
}

/// Output parameters shared by every write.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions<'a> {
    pub domain: &'a str,
    pub remove_flags: &'a str,
    /// Skip records marked duplicate.
    pub no_dupes: bool,
}

/// What happened to one bucket during the write phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketReport {
    pub bucket: Bucket,
    /// Records classified into the bucket.
    pub size: usize,
    /// Files actually written.
    pub written: usize,
    /// Bytes copied.
    pub bytes: u64,
}

/// Drain every bucket into its maildir under `output`.
///
/// Buckets are written in [`Bucket::ALL`] order. The first failing write
/// aborts the whole phase.
pub fn write_buckets(
    buckets: &Buckets,
    output: &Path,
    opts: &WriteOptions<'_>,
    seq: &SequenceIssuer,
    progress: &dyn Progress,
) -> Result<Vec<BucketReport>> {
    let mut reports = Vec::with_capacity(Bucket::ALL.len());

    for bucket in Bucket::ALL {
        let records = buckets.get(bucket);
        let dir = output.join(bucket.dir_name());
        let mut report = BucketReport {
            bucket,
            size: records.len(),
            written: 0,
            bytes: 0,
        };

        for (i, record) in records.iter().enumerate() {
            if !(opts.no_dupes && record.is_duplicate) {
                let saved = maildir::save(record, &dir, opts.domain, opts.remove_flags, seq)?;
                debug!(
                    from = %record.source_path.display(),
                    to = %saved.path.display(),
                    "Wrote message"
                );
                report.written += 1;
                report.bytes += saved.bytes;
                if report.written as u64 % LOG_EVERY == 0 {
                    info!(%bucket, count = report.written, "Wrote messages");
                }
            }
            progress.write(bucket, i + 1, records.len());
        }

        info!(
            %bucket,
            written = report.written,
            size = report.size,
            "Wrote bucket"
        );
        reports.push(report);
    }

    Ok(reports)
}

/// Outcome of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub stats: IngestStats,
    pub buckets: Vec<BucketReport>,
}

/// Run the whole pipeline: reset the output tree, read all inboxes then
/// all archives, and write the buckets.
pub fn run(settings: &RunSettings, progress: &dyn Progress) -> Result<RunSummary> {
    settings.validate()?;

    reset_output_tree(&settings.output)?;
    let seq = SequenceIssuer::spawn()?;
    let dupes = DupesLog::create(&settings.dupes_log)?;

    let mut ingest = Ingest::new(
        &settings.domain,
        Identities::new(&settings.identities),
        dupes,
    );
    for dir in &settings.inboxes {
        ingest.ingest_maildir(dir, SourceRole::Inbox, progress)?;
    }
    for dir in &settings.archives {
        ingest.ingest_maildir(dir, SourceRole::Archive, progress)?;
    }
    let (buckets, stats, _) = ingest.finish()?;

    info!(
        total = stats.total,
        unique = stats.unique,
        duplicates = stats.duplicates,
        no_timestamp = stats.no_timestamp,
        no_id = stats.no_id,
        "Finished reading"
    );

    let opts = WriteOptions {
        domain: &settings.domain,
        remove_flags: &settings.remove_flags,
        no_dupes: settings.no_dupes,
    };
    let reports = write_buckets(&buckets, &settings.output, &opts, &seq, progress)?;

    Ok(RunSummary {
        stats,
        buckets: reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn ingest() -> Ingest<Vec<u8>> {
        Ingest::new(
            "bunch.local",
            Identities::new(["me@example.com"]),
            DupesLog::new(Vec::new()).unwrap(),
        )
    }

    #[test]
    fn test_later_copy_is_duplicate() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("1.a:2,S");
        let b = tmp.path().join("2.b:2,S");
        fs::write(&a, "From: you@example.com\nMessage-ID: <abc@x>\n\nfirst\n").unwrap();
        fs::write(&b, "From: you@example.com\nMessage-ID: <abc@x>\n\nsecond\n").unwrap();

        let mut ing = ingest();
        ing.ingest_file(&a, SourceRole::Inbox).unwrap();
        ing.ingest_file(&b, SourceRole::Inbox).unwrap();

        let inbox = ing.buckets().get(Bucket::Inbox);
        assert_eq!(inbox.len(), 2);
        assert!(!inbox[0].is_duplicate);
        assert!(inbox[1].is_duplicate);
        assert_eq!(ing.stats().duplicates, 1);

        let (_, stats, log) = ing.finish().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.unique, 1);
        let log = String::from_utf8(log).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.lines().nth(1).unwrap().ends_with("2.b:2,S"));
    }

    #[test]
    fn test_sent_overrides_archive_role() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("1.a:2,S");
        fs::write(&a, "From: Me <ME@example.com>\nMessage-ID: <s@x>\n\nhi\n").unwrap();

        let mut ing = ingest();
        assert_eq!(ing.ingest_file(&a, SourceRole::Archive).unwrap(), Bucket::Sent);
        assert_eq!(ing.buckets().total(), 1);
    }

    #[test]
    fn test_audit_counters() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("1.a:2,");
        fs::write(&a, "Subject: bare\n\nbody\n").unwrap();

        let mut ing = ingest();
        assert_eq!(ing.ingest_file(&a, SourceRole::Archive).unwrap(), Bucket::Archive);
        let stats = ing.stats();
        assert_eq!(stats.no_id, 1);
        assert_eq!(stats.no_timestamp, 1);
        assert_eq!(stats.duplicates, 0);
    }

    #[test]
    fn test_ingest_maildir_reads_all_subdirs() {
        let tmp = tempfile::tempdir().unwrap();
        for (i, sub) in SUBDIRS.iter().enumerate() {
            let dir = tmp.path().join(sub);
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join(format!("{i}.m:2,")),
                format!("Message-ID: <m{i}@x>\n\nbody\n"),
            )
            .unwrap();
        }

        let mut ing = ingest();
        let n = ing
            .ingest_maildir(tmp.path(), SourceRole::Inbox, &NoProgress)
            .unwrap();
        assert_eq!(n, 3);
        let ids: Vec<&str> = ing
            .buckets()
            .get(Bucket::Inbox)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["m0@x", "m1@x", "m2@x"]);
    }
}
