//! Maildir directory handling: listing, output layout, byte copies, mtimes.

use std::fs::{self, File, FileTimes, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{BunchError, Result};
use crate::model::bucket::Bucket;

/// Maildir subdirectories, in the order they are read.
pub const SUBDIRS: [&str; 3] = ["new", "cur", "tmp"];

/// List the message files of one maildir folder, sorted by file name.
///
/// A nested directory is an error: maildir folders hold only files.
pub fn list_messages(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| BunchError::io(dir, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BunchError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| BunchError::io(&path, e))?;
        if file_type.is_dir() {
            return Err(BunchError::UnexpectedDirectory(path));
        }
        paths.push(path);
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    debug!(dir = %dir.display(), count = paths.len(), "Listed maildir folder");
    Ok(paths)
}

/// Remove `root` and recreate it with an empty maildir per bucket.
pub fn reset_output_tree(root: &Path) -> Result<()> {
    match fs::remove_dir_all(root) {
        Ok(()) => info!(path = %root.display(), "Removed previous output directory"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(BunchError::io(root, e)),
    }

    for bucket in Bucket::ALL {
        let bucket_dir = root.join(bucket.dir_name());
        for sub in SUBDIRS {
            let dir = bucket_dir.join(sub);
            fs::create_dir_all(&dir).map_err(|e| BunchError::io(&dir, e))?;
        }
    }
    Ok(())
}

/// Copy `src` to a new file at `dst` and flush it to disk.
///
/// Returns the number of bytes copied. An existing `dst` is an error.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    let mut input = File::open(src).map_err(|e| BunchError::io(src, e))?;
    let mut output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst)
        .map_err(|e| BunchError::io(dst, e))?;
    let bytes = io::copy(&mut input, &mut output).map_err(|e| BunchError::io(dst, e))?;
    output.sync_all().map_err(|e| BunchError::io(dst, e))?;
    Ok(bytes)
}

/// Set both access and modification time of `path` to `time`.
pub fn set_file_time(path: &Path, time: DateTime<Utc>) -> Result<()> {
    let time = SystemTime::from(time);
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| BunchError::io(path, e))?;
    file.set_times(FileTimes::new().set_accessed(time).set_modified(time))
        .map_err(|e| BunchError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_messages_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["b:2,S", "a:2,", "c:2,RS"] {
            fs::write(tmp.path().join(name), "x").unwrap();
        }
        let names: Vec<String> = list_messages(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a:2,", "b:2,S", "c:2,RS"]);
    }

    #[test]
    fn test_list_rejects_directories() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();
        let err = list_messages(tmp.path()).unwrap_err();
        assert!(matches!(err, BunchError::UnexpectedDirectory(_)));
    }

    #[test]
    fn test_list_missing_dir_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = list_messages(&tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, BunchError::Io { .. }));
    }

    #[test]
    fn test_reset_output_tree_clears_old_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("out");
        fs::create_dir_all(root.join("stale")).unwrap();
        fs::write(root.join("stale").join("file"), "old").unwrap();

        reset_output_tree(&root).unwrap();

        assert!(!root.join("stale").exists());
        for bucket in Bucket::ALL {
            for sub in SUBDIRS {
                let dir = root.join(bucket.dir_name()).join(sub);
                assert!(dir.is_dir(), "missing {}", dir.display());
                assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
            }
        }
    }

    #[test]
    fn test_copy_and_set_time() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::write(&src, b"Subject: hi\n\nbody\n").unwrap();

        let bytes = copy_file(&src, &dst).unwrap();
        assert_eq!(bytes, 18);
        assert_eq!(fs::read(&dst).unwrap(), fs::read(&src).unwrap());

        let when = DateTime::from_timestamp(1_578_650_400, 0).unwrap();
        set_file_time(&dst, when).unwrap();
        let mtime = fs::metadata(&dst).unwrap().modified().unwrap();
        assert_eq!(DateTime::<Utc>::from(mtime), when);
    }

    #[test]
    fn test_copy_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::write(&src, "a").unwrap();
        let dst = tmp.path().join("dst");
        fs::write(&dst, "b").unwrap();
        assert!(copy_file(&src, &dst).is_err());
    }
}
