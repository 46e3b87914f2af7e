//! Output writer: re-emits a message under a collision-free maildir name.
//!
//! Name format: `<unix seconds>.<sequence, 9 digits>.<domain>:2,<flags>`.
//! Messages with no remaining flags go to `new/`, all others to `cur/`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::message::MessageRecord;
use crate::parser::message::FLAGS_DELIMITER;
use crate::pipeline::sequence::SequenceIssuer;
use crate::store::maildir::{copy_file, set_file_time};

/// A message written to the output tree.
#[derive(Debug, Clone)]
pub struct SavedMessage {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Copy `record` into the bucket maildir at `bucket_dir`.
///
/// The new file's mtime and atime are set to the record's timestamp. Any
/// copy or time-set failure is returned as an error.
pub fn save(
    record: &MessageRecord,
    bucket_dir: &Path,
    domain: &str,
    remove_flags: &str,
    seq: &SequenceIssuer,
) -> Result<SavedMessage> {
    let kept = strip_flags(&record.flags, remove_flags);
    let n = seq.next()?;

    let name = output_file_name(record.timestamp, n, domain, &kept);
    let sub = if kept.is_empty() { "new" } else { "cur" };
    let path = bucket_dir.join(sub).join(name);

    let bytes = copy_file(&record.source_path, &path)?;
    set_file_time(&path, record.timestamp)?;

    Ok(SavedMessage { path, bytes })
}

/// `flags` without any character in `remove` (case-insensitive).
pub fn strip_flags(flags: &str, remove: &str) -> String {
    flags
        .chars()
        .filter(|f| {
            !remove
                .chars()
                .any(|r| r.to_uppercase().eq(f.to_uppercase()))
        })
        .collect()
}

/// Build the output file name for a message.
pub fn output_file_name(timestamp: DateTime<Utc>, sequence: u64, domain: &str, flags: &str) -> String {
    format!(
        "{}.{:09}.{}{}{}",
        timestamp.timestamp(),
        sequence,
        domain,
        FLAGS_DELIMITER,
        flags
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_flags_case_insensitive() {
        assert_eq!(strip_flags("FRS", "s"), "FR");
        assert_eq!(strip_flags("FRS", "FRT"), "S");
        assert_eq!(strip_flags("S", "S"), "");
        assert_eq!(strip_flags("RS", ""), "RS");
        assert_eq!(strip_flags("", "S"), "");
    }

    #[test]
    fn test_output_file_name() {
        let ts = DateTime::from_timestamp(1_578_650_400, 0).unwrap();
        assert_eq!(
            output_file_name(ts, 42, "bunch.local", "RS"),
            "1578650400.000000042.bunch.local:2,RS"
        );
        assert_eq!(
            output_file_name(DateTime::UNIX_EPOCH, 0, "d", ""),
            "0.000000000.d:2,"
        );
    }

    #[test]
    fn test_save_places_by_kept_flags() {
        let tmp = tempfile::tempdir().unwrap();
        let bucket = tmp.path().join("Inbox");
        for sub in ["cur", "new", "tmp"] {
            std::fs::create_dir_all(bucket.join(sub)).unwrap();
        }
        let src = tmp.path().join("1000.abc:2,S");
        std::fs::write(&src, "Subject: x\n\nbody\n").unwrap();

        let ts = DateTime::from_timestamp(1_578_650_400, 0).unwrap();
        let record = MessageRecord {
            id: "abc@x".to_string(),
            timestamp: ts,
            subject: "x".to_string(),
            from: String::new(),
            flags: "RS".to_string(),
            source_path: src,
            is_duplicate: false,
            has_synthetic_id: false,
            has_no_timestamp: false,
        };
        let seq = SequenceIssuer::spawn().unwrap();

        let to_new = save(&record, &bucket, "d", "RS", &seq).unwrap();
        assert_eq!(to_new.path, bucket.join("new").join("1578650400.000000000.d:2,"));

        let to_cur = save(&record, &bucket, "d", "S", &seq).unwrap();
        assert_eq!(to_cur.path, bucket.join("cur").join("1578650400.000000001.d:2,R"));
        assert_eq!(to_cur.bytes, 17);

        let mtime = std::fs::metadata(&to_cur.path).unwrap().modified().unwrap();
        assert_eq!(DateTime::<Utc>::from(mtime), ts);
    }
}
