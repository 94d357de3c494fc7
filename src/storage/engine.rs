//! # Bucket Storage Engine
//!
//! This module orchestrates every mutation of the store. All five public
//! operations resolve a record id to its owning bucket through the in-memory
//! index, then rewrite that bucket's header and payload region in place.
//!
//! ## Rewrite Pipeline
//!
//! Insert, update and remove share one pipeline parameterised by an
//! operation tag:
//!
//! ```text
//! 1. LOCATE: predecessor lookup in the index, read + cross-check the
//!    owning bucket's header, find the record's slot (if any)
//! 2. PROMOTE: insert of a present id becomes update; update of an absent
//!    id becomes insert; remove of an absent id is an error
//! 3. REWRITE: mutate the entry array, shift trailing payload offsets,
//!    write header + payloads, truncate or rename the file as needed
//! 4. INDEX: mirror the new record count (or bucket set) in memory
//! ```
//!
//! ## Bucket Life Cycle
//!
//! ```text
//!            insert (no owner / owner full)
//!   absent ──────────────────────────────────> present (1..=capacity)
//!      ^                                          │   │
//!      │              remove of last record       │   │ remove of slot 0
//!      └──────────────────────────────────────────┘   ▼
//!                                              renamed to new smallest id
//! ```
//!
//! A split relieves a full bucket: the inserted id becomes the name of a new
//! bucket that also takes every record above it, and the source file is
//! truncated down to the records it keeps.
//!
//! ## Trailing Rewrites
//!
//! Payloads are packed without gaps, so any size change ripples through the
//! records behind it. The pipeline always reads the affected tail before the
//! first write, then lays the new payload and the tail back down in a single
//! write that also establishes the file's exact new length.
//!
//! ## Concurrency
//!
//! One exclusive lock serialises every operation end-to-end, reads included.
//! There is no internal parallelism; the promotion step runs on state that is
//! already locked, so the lock is never re-acquired.
//!
//! ## Failure Semantics
//!
//! I/O errors propagate to the caller with path context; a failed rewrite is
//! not rolled back. A header whose record count disagrees with the index is
//! reported as an error without mutating anything. Recovery skips unreadable
//! or malformed buckets with a diagnostic instead of failing the open.

use std::path::{Path, PathBuf};

use eyre::{bail, ensure, Result, WrapErr};
use parking_lot::Mutex;
use zerocopy::IntoBytes;

use crate::config::{BUCKET_CAPACITY, BUCKET_HEADER_SIZE};

use super::bucket::{
    bucket_file_name, parse_bucket_file_name, validate_header, BucketEntry, BucketHeader,
};
use super::fs;
use super::index::BucketIndex;

/// Offsets are stored as u32, so a bucket file can never grow past this.
const MAX_BUCKET_FILE_SIZE: u64 = u32::MAX as u64;

/// The bucket-file storage engine: a data directory plus the sorted index
/// that routes record ids to bucket files.
pub struct BucketEngine {
    data_dir: PathBuf,
    index: Mutex<BucketIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RewriteOp {
    Insert,
    Update,
    Remove,
}

/// Everything LOCATE learns about the bucket owning a record id.
struct Located {
    bucket_id: i64,
    header: BucketHeader,
    count: usize,
    position: Option<usize>,
}

impl BucketEngine {
    /// Opens the store rooted at `data_dir`, creating the directory if
    /// needed and rebuilding the index from the bucket files found there.
    ///
    /// Files whose names do not match the bucket naming scheme are ignored;
    /// buckets whose headers cannot be read or fail validation are skipped
    /// with a diagnostic and do not abort the open.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::ensure_dir(&data_dir)?;

        let mut index = BucketIndex::new();
        for name in fs::list_dir(&data_dir)? {
            let Some(bucket_id) = parse_bucket_file_name(&name) else {
                continue;
            };

            let path = data_dir.join(&name);
            match read_header(&path).and_then(|header| validate_header(&header, bucket_id)) {
                Ok(count) => index.insert(bucket_id, count),
                Err(err) => {
                    eprintln!("[recovery] skipping bucket file {name}: {err:#}");
                }
            }
        }

        Ok(Self {
            data_dir,
            index: Mutex::new(index),
        })
    }

    /// Whether a record with `id` is present.
    ///
    /// I/O failures and corrupt headers are reported on stderr and answered
    /// with `false`; presence cannot be confirmed from a bucket that cannot
    /// be read.
    pub fn exists(&self, id: i64) -> bool {
        let index = self.index.lock();
        match self.locate(&index, id) {
            Ok(located) => located.is_some_and(|l| l.position.is_some()),
            Err(err) => {
                eprintln!("[engine] exists({id}) failed: {err:#}");
                false
            }
        }
    }

    /// Returns the record's payload, or `None` when the id is absent.
    pub fn get(&self, id: i64) -> Result<Option<Vec<u8>>> {
        let index = self.index.lock();

        let Some(located) = self.locate(&index, id)? else {
            return Ok(None);
        };
        let Some(position) = located.position else {
            return Ok(None);
        };

        let entry = located.header.entry(position);
        let mut payload = vec![0u8; entry.size() as usize];
        fs::read_exact_at(
            &self.bucket_path(located.bucket_id),
            &mut payload,
            entry.offset() as u64,
        )?;

        Ok(Some(payload))
    }

    /// Inserts a record. An already-present id makes this an update.
    pub fn insert(&self, id: i64, data: &[u8]) -> Result<()> {
        let mut index = self.index.lock();
        self.apply(&mut index, RewriteOp::Insert, id, data)
    }

    /// Replaces a record's payload. An absent id makes this an insert.
    pub fn update(&self, id: i64, data: &[u8]) -> Result<()> {
        let mut index = self.index.lock();
        self.apply(&mut index, RewriteOp::Update, id, data)
    }

    /// Deletes a record. An absent id is an error.
    pub fn remove(&self, id: i64) -> Result<()> {
        let mut index = self.index.lock();
        self.apply(&mut index, RewriteOp::Remove, id, &[])
    }

    /// Number of bucket files the index currently tracks.
    pub fn bucket_count(&self) -> usize {
        self.index.lock().len()
    }

    fn bucket_path(&self, bucket_id: i64) -> PathBuf {
        self.data_dir.join(bucket_file_name(bucket_id))
    }

    /// LOCATE: owning bucket, its header (cross-checked against the index)
    /// and the record's slot within it.
    fn locate(&self, index: &BucketIndex, id: i64) -> Result<Option<Located>> {
        let Some(bucket_id) = index.owning_bucket(id) else {
            return Ok(None);
        };

        let header = read_header(&self.bucket_path(bucket_id))
            .wrap_err_with(|| format!("bucket {bucket_id} is tracked by the index"))?;
        let count = header.count();

        let indexed = index.count(bucket_id).unwrap_or(0);
        ensure!(
            count == indexed,
            "bucket {bucket_id} holds {count} records but the index expects {indexed}"
        );

        Ok(Some(Located {
            bucket_id,
            header,
            count,
            position: header.position_of(id, count),
        }))
    }

    /// PROMOTE + REWRITE: the single parameterised mutation pipeline.
    fn apply(
        &self,
        index: &mut BucketIndex,
        requested: RewriteOp,
        id: i64,
        data: &[u8],
    ) -> Result<()> {
        let located = self.locate(index, id)?;
        let present = located.as_ref().is_some_and(|l| l.position.is_some());

        let op = match requested {
            RewriteOp::Insert if present => RewriteOp::Update,
            RewriteOp::Update if !present => RewriteOp::Insert,
            RewriteOp::Remove if !present => bail!("record {id} not found"),
            other => other,
        };

        match op {
            RewriteOp::Insert => match located {
                None => self.create_bucket(index, id, data),
                Some(located) if located.count < BUCKET_CAPACITY => {
                    self.insert_into_bucket(index, located, id, data)
                }
                Some(located) => self.split_bucket(index, located, id, data),
            },
            RewriteOp::Update => {
                let Some(located) = located else {
                    bail!("record {id} was promoted to update but has no bucket");
                };
                let Some(position) = located.position else {
                    bail!("record {id} was promoted to update but has no slot");
                };
                self.update_record(located, position, data)
            }
            RewriteOp::Remove => {
                let Some(located) = located else {
                    bail!("record {id} was located but has no bucket");
                };
                let Some(position) = located.position else {
                    bail!("record {id} was located but has no slot");
                };
                self.remove_record(index, located, position)
            }
        }
    }

    /// INSERT with no owning bucket: a fresh file named for the record.
    fn create_bucket(&self, index: &mut BucketIndex, id: i64, data: &[u8]) -> Result<()> {
        let end = BUCKET_HEADER_SIZE as u64 + data.len() as u64;
        ensure!(
            end <= MAX_BUCKET_FILE_SIZE,
            "record {id} would grow its bucket past the 4 GiB file limit"
        );

        let header = BucketHeader::new_single(id, data.len() as u32);

        let mut buf = Vec::with_capacity(end as usize);
        buf.extend_from_slice(header.as_bytes());
        buf.extend_from_slice(data);
        fs::write_all_at(&self.bucket_path(id), &buf, 0, true)?;

        index.insert(id, 1);
        Ok(())
    }

    /// INSERT into a bucket with a free slot: shift the entries and payloads
    /// behind the insertion point one slot / `data.len()` bytes to the right.
    fn insert_into_bucket(
        &self,
        index: &mut BucketIndex,
        located: Located,
        id: i64,
        data: &[u8],
    ) -> Result<()> {
        let Located {
            bucket_id,
            mut header,
            count,
            ..
        } = located;
        let path = self.bucket_path(bucket_id);

        let old_end = header.end_offset(count);
        ensure!(
            old_end + data.len() as u64 <= MAX_BUCKET_FILE_SIZE,
            "record {id} would grow bucket {bucket_id} past the 4 GiB file limit"
        );

        let position = header.insertion_point(id, count);
        let new_offset = if position == 0 {
            // Unreachable in practice: the bucket's smallest id is below any
            // id it owns, but the fresh-file layout is still the right one.
            BUCKET_HEADER_SIZE as u64
        } else {
            header.entry(position - 1).end()
        };

        let mut tail = vec![0u8; (old_end - new_offset) as usize];
        if !tail.is_empty() {
            fs::read_exact_at(&path, &mut tail, new_offset)?;
        }

        for slot in (position..count).rev() {
            let mut entry = *header.entry(slot);
            entry.set_offset(entry.offset() + data.len() as u32);
            *header.entry_mut(slot + 1) = entry;
        }
        *header.entry_mut(position) = BucketEntry::new(new_offset as u32, data.len() as u32, id);

        fs::write_all_at(&path, header.as_bytes(), 0, false)?;

        let mut buf = Vec::with_capacity(data.len() + tail.len());
        buf.extend_from_slice(data);
        buf.extend_from_slice(&tail);
        fs::write_all_at(&path, &buf, new_offset, false)?;

        index.set_count(bucket_id, count + 1);
        Ok(())
    }

    /// INSERT into a full bucket: the new id names a new bucket that takes
    /// the record plus every source entry above it; the source keeps the
    /// rest and is truncated.
    fn split_bucket(
        &self,
        index: &mut BucketIndex,
        located: Located,
        id: i64,
        data: &[u8],
    ) -> Result<()> {
        let Located {
            bucket_id,
            mut header,
            count,
            ..
        } = located;
        let src_path = self.bucket_path(bucket_id);

        let position = header.insertion_point(id, count);
        ensure!(
            position > 0,
            "record {id} sorts below bucket {bucket_id}, which should own it"
        );
        let migrated = count - position;

        let src_end = header.end_offset(count);
        let migrated_start = if migrated > 0 {
            header.entry(position).offset() as u64
        } else {
            src_end
        };
        let migrated_len = (src_end - migrated_start) as usize;

        let new_end = BUCKET_HEADER_SIZE as u64 + data.len() as u64 + migrated_len as u64;
        ensure!(
            new_end <= MAX_BUCKET_FILE_SIZE,
            "record {id} would grow its new bucket past the 4 GiB file limit"
        );

        let mut new_header = BucketHeader::new_single(id, data.len() as u32);
        let mut offset = BUCKET_HEADER_SIZE as u64 + data.len() as u64;
        for slot in 0..migrated {
            let source = header.entry(position + slot);
            *new_header.entry_mut(slot + 1) = BucketEntry::new(offset as u32, source.size(), source.id());
            offset += source.size() as u64;
        }

        let mut migrated_payload = vec![0u8; migrated_len];
        if migrated_len > 0 {
            fs::read_exact_at(&src_path, &mut migrated_payload, migrated_start)?;
        }

        let mut buf = Vec::with_capacity(new_end as usize);
        buf.extend_from_slice(new_header.as_bytes());
        buf.extend_from_slice(data);
        buf.extend_from_slice(&migrated_payload);
        fs::write_all_at(&self.bucket_path(id), &buf, 0, true)?;

        for slot in position..count {
            header.entry_mut(slot).clear();
        }
        let retained_end = header.entry(position - 1).end();
        fs::write_all_at(&src_path, header.as_bytes(), 0, false)?;
        fs::write_all_at(&src_path, &[], retained_end, true)?;

        index.set_count(bucket_id, position);
        index.insert(id, 1 + migrated);
        Ok(())
    }

    /// UPDATE: resize the record's payload region and shift everything
    /// behind it by the size delta.
    fn update_record(&self, located: Located, position: usize, data: &[u8]) -> Result<()> {
        let Located {
            bucket_id,
            mut header,
            count,
            ..
        } = located;
        let path = self.bucket_path(bucket_id);

        let old = *header.entry(position);
        let new_size = data.len() as u64;

        if new_size == old.size() as u64 {
            if !data.is_empty() {
                fs::write_all_at(&path, data, old.offset() as u64, false)?;
            }
            return Ok(());
        }

        let old_end = header.end_offset(count);
        let new_end = old_end - old.size() as u64 + new_size;
        ensure!(
            new_end <= MAX_BUCKET_FILE_SIZE,
            "record {} would grow bucket {bucket_id} past the 4 GiB file limit",
            old.id()
        );

        let mut tail = vec![0u8; (old_end - old.end()) as usize];
        if !tail.is_empty() {
            fs::read_exact_at(&path, &mut tail, old.end())?;
        }

        let delta = new_size as i64 - old.size() as i64;
        header.entry_mut(position).set_size(new_size as u32);
        for slot in position + 1..count {
            let entry = header.entry_mut(slot);
            entry.set_offset((entry.offset() as i64 + delta) as u32);
        }

        fs::write_all_at(&path, header.as_bytes(), 0, false)?;

        let mut buf = Vec::with_capacity(data.len() + tail.len());
        buf.extend_from_slice(data);
        buf.extend_from_slice(&tail);
        fs::write_all_at(&path, &buf, old.offset() as u64, true)?;

        Ok(())
    }

    /// REMOVE: drop the record's entry and close the payload gap; the last
    /// record removes the file, removing slot 0 renames it.
    fn remove_record(
        &self,
        index: &mut BucketIndex,
        located: Located,
        position: usize,
    ) -> Result<()> {
        let Located {
            bucket_id,
            mut header,
            count,
            ..
        } = located;
        let path = self.bucket_path(bucket_id);

        if count == 1 {
            fs::remove_file(&path)?;
            index.remove(bucket_id);
            return Ok(());
        }

        let removed = *header.entry(position);
        let old_end = header.end_offset(count);

        let mut tail = vec![0u8; (old_end - removed.end()) as usize];
        if !tail.is_empty() {
            fs::read_exact_at(&path, &mut tail, removed.end())?;
        }

        for slot in position..count - 1 {
            let mut entry = *header.entry(slot + 1);
            entry.set_offset(entry.offset() - removed.size());
            *header.entry_mut(slot) = entry;
        }
        header.entry_mut(count - 1).clear();

        fs::write_all_at(&path, header.as_bytes(), 0, false)?;
        fs::write_all_at(&path, &tail, removed.offset() as u64, true)?;

        index.set_count(bucket_id, count - 1);

        if position == 0 {
            let new_id = header.entry(0).id();
            fs::rename_file(&path, &self.bucket_path(new_id))?;
            index.rename(bucket_id, new_id);
        }

        Ok(())
    }
}

fn read_header(path: &Path) -> Result<BucketHeader> {
    let mut buf = [0u8; BUCKET_HEADER_SIZE];
    fs::read_exact_at(path, &mut buf, 0)?;
    Ok(BucketHeader::from_bytes(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_the_data_directory() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("db");

        let engine = BucketEngine::open(&data_dir).unwrap();

        assert!(data_dir.is_dir());
        assert_eq!(engine.bucket_count(), 0);
        assert!(!engine.exists(1));
    }

    #[test]
    fn exists_is_false_when_the_bucket_file_vanished() {
        let dir = tempdir().unwrap();
        let engine = BucketEngine::open(dir.path()).unwrap();
        engine.insert(7, b"payload").unwrap();

        std::fs::remove_file(dir.path().join(bucket_file_name(7))).unwrap();

        assert!(!engine.exists(7));
        assert!(engine.get(7).is_err());
    }

    #[test]
    fn index_header_disagreement_is_reported() {
        let dir = tempdir().unwrap();
        let engine = BucketEngine::open(dir.path()).unwrap();
        engine.insert(7, b"a").unwrap();
        engine.insert(8, b"b").unwrap();

        // Corrupt the header so it claims a single record.
        let path = dir.path().join(bucket_file_name(7));
        let mut header = read_header(&path).unwrap();
        header.entry_mut(1).clear();
        fs::write_all_at(&path, header.as_bytes(), 0, false).unwrap();

        assert!(engine.get(8).is_err());
        assert!(!engine.exists(8));
    }

    #[test]
    fn remove_missing_record_fails() {
        let dir = tempdir().unwrap();
        let engine = BucketEngine::open(dir.path()).unwrap();

        assert!(engine.remove(42).is_err());
        assert_eq!(engine.bucket_count(), 0);
    }
}
