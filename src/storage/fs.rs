//! # Positional File I/O Helpers
//!
//! This module is the only place PailDB touches the host filesystem. It wraps
//! the handful of operations the bucket engine needs — directory management,
//! exact reads and writes at explicit offsets, remove and rename — behind
//! small synchronous functions that attach path context to every failure.
//!
//! ## Write Semantics
//!
//! `write_all_at` creates the target file on first use (mode 0640), writes
//! the full buffer at the requested offset, optionally truncates the file to
//! `offset + buf.len()`, and syncs before returning. Truncation and write are
//! one call on purpose: every engine rewrite ends with a single write that
//! also establishes the file's exact new length.
//!
//! ## Read Semantics
//!
//! `read_exact_at` fails on short reads. The engine always knows precisely
//! how many bytes a header or payload region holds, so a short read means the
//! file does not match its header and must surface as an error, never as a
//! partial buffer.
//!
//! ## Interrupted Syscalls
//!
//! `read_exact_at`/`write_all_at` from `std::os::unix::fs::FileExt` retry
//! `EINTR` internally, so no retry loops appear here.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};

use crate::config::BUCKET_FILE_MODE;

/// Creates `path` as a directory if it does not exist yet. Idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .wrap_err_with(|| format!("failed to create data directory '{}'", path.display()))?;

    let metadata = std::fs::metadata(path)
        .wrap_err_with(|| format!("failed to stat data directory '{}'", path.display()))?;

    ensure!(
        metadata.is_dir(),
        "'{}' exists but is not a directory",
        path.display()
    );

    Ok(())
}

/// Returns the file names (not full paths) of every entry in `path`.
pub fn list_dir(path: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(path)
        .wrap_err_with(|| format!("failed to read data directory '{}'", path.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.wrap_err("failed to read directory entry")?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }

    Ok(names)
}

/// Reads exactly `buf.len()` bytes from `path` starting at `offset`.
pub fn read_exact_at(path: &Path, buf: &mut [u8], offset: u64) -> Result<()> {
    let file = File::open(path)
        .wrap_err_with(|| format!("failed to open bucket file '{}'", path.display()))?;

    file.read_exact_at(buf, offset).wrap_err_with(|| {
        format!(
            "failed to read {} bytes at offset {} from '{}'",
            buf.len(),
            offset,
            path.display()
        )
    })?;

    Ok(())
}

/// Writes all of `buf` to `path` at `offset`, creating the file if needed.
///
/// With `truncate` set the file is cut to end exactly at `offset +
/// buf.len()`; an empty buffer then acts as a plain truncation. The file is
/// synced before close.
pub fn write_all_at(path: &Path, buf: &[u8], offset: u64, truncate: bool) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(BUCKET_FILE_MODE)
        .open(path)
        .wrap_err_with(|| format!("failed to open bucket file '{}' for writing", path.display()))?;

    if !buf.is_empty() {
        file.write_all_at(buf, offset).wrap_err_with(|| {
            format!(
                "failed to write {} bytes at offset {} to '{}'",
                buf.len(),
                offset,
                path.display()
            )
        })?;
    }

    if truncate {
        let end = offset + buf.len() as u64;
        file.set_len(end)
            .wrap_err_with(|| format!("failed to truncate '{}' to {} bytes", path.display(), end))?;
    }

    file.sync_all()
        .wrap_err_with(|| format!("failed to sync '{}'", path.display()))?;

    Ok(())
}

/// Removes the file at `path`.
pub fn remove_file(path: &Path) -> Result<()> {
    std::fs::remove_file(path)
        .wrap_err_with(|| format!("failed to remove bucket file '{}'", path.display()))
}

/// Renames `old` to `new` within the data directory.
pub fn rename_file(old: &Path, new: &Path) -> Result<()> {
    std::fs::rename(old, new).wrap_err_with(|| {
        format!(
            "failed to rename bucket file '{}' to '{}'",
            old.display(),
            new.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data");

        ensure_dir(&path).unwrap();
        ensure_dir(&path).unwrap();

        assert!(path.is_dir());
    }

    #[test]
    fn ensure_dir_rejects_regular_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data");
        std::fs::write(&path, b"not a directory").unwrap();

        assert!(ensure_dir(&path).is_err());
    }

    #[test]
    fn write_then_read_at_offset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob");

        write_all_at(&path, b"hello world", 0, false).unwrap();

        let mut buf = [0u8; 5];
        read_exact_at(&path, &mut buf, 6).unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn write_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh");

        write_all_at(&path, b"abc", 0, false).unwrap();

        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn truncating_write_sets_exact_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob");
        write_all_at(&path, b"0123456789", 0, false).unwrap();

        write_all_at(&path, b"AB", 2, true).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"01AB");
    }

    #[test]
    fn empty_truncating_write_cuts_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob");
        write_all_at(&path, b"0123456789", 0, false).unwrap();

        write_all_at(&path, &[], 4, true).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"0123");
    }

    #[test]
    fn short_read_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob");
        write_all_at(&path, b"abc", 0, false).unwrap();

        let mut buf = [0u8; 8];
        assert!(read_exact_at(&path, &mut buf, 0).is_err());
    }

    #[test]
    fn rename_moves_the_file() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old");
        let new = dir.path().join("new");
        write_all_at(&old, b"payload", 0, false).unwrap();

        rename_file(&old, &new).unwrap();

        assert!(!old.exists());
        assert_eq!(std::fs::read(&new).unwrap(), b"payload");
    }

    #[test]
    fn list_dir_returns_names_only() {
        let dir = tempdir().unwrap();
        write_all_at(&dir.path().join("a"), b"", 0, true).unwrap();
        write_all_at(&dir.path().join("b"), b"", 0, true).unwrap();

        let mut names = list_dir(dir.path()).unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
