//! # Bucket File Format
//!
//! This module defines the on-disk layout of a bucket file and the naming
//! scheme that ties a file to the records it holds. Each bucket file begins
//! with a fixed-size header of [`BUCKET_CAPACITY`] entries followed by the
//! record payloads packed in ascending id order:
//!
//! ```text
//! +---------------------------+
//! | BucketHeader (160 bytes)  |  <- one 16-byte entry per record slot
//! +---------------------------+
//! | payload of smallest id    |  <- starts at offset 160
//! +---------------------------+
//! | payload of next id        |  <- packed, no gaps
//! +---------------------------+
//! | ...                       |
//! +---------------------------+
//! ```
//!
//! ## Entry Layout
//!
//! ```text
//! Offset  Size  Description
//! 0       4     Payload offset within the file (0 marks a free slot)
//! 4       4     Payload size in bytes (may be 0)
//! 8       8     Record id (signed 64-bit)
//! ```
//!
//! Used entries occupy a prefix of the array, sorted strictly ascending by
//! id, and their payload offsets appear in the same order. A used entry can
//! never carry offset 0 because the header itself occupies the first 160
//! bytes, which is what makes 0 safe as the free-slot marker.
//!
//! ## File Names
//!
//! A bucket is named after the smallest id it contains: 20 zero-padded
//! decimal digits plus `.db`, e.g. `00000000000000000101.db`. Recovery only
//! admits directory entries that match this shape exactly, so stray files in
//! the data directory are invisible to the store.
//!
//! ## Endianness
//!
//! All multi-byte fields are little-endian with fixed widths. The zerocopy
//! `U32<LittleEndian>` / `I64<LittleEndian>` types handle conversion, so the
//! format is stable across machines.

use eyre::{ensure, Result};
use zerocopy::little_endian::{I64, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{
    BUCKET_CAPACITY, BUCKET_ENTRY_SIZE, BUCKET_FILE_EXTENSION, BUCKET_FILE_NAME_LEN,
    BUCKET_HEADER_SIZE, BUCKET_ID_DIGITS,
};

/// One header slot: where a record's payload lives and which id owns it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct BucketEntry {
    offset: U32,
    size: U32,
    id: I64,
}

const _: () = assert!(std::mem::size_of::<BucketEntry>() == BUCKET_ENTRY_SIZE);

impl BucketEntry {
    pub fn new(offset: u32, size: u32, id: i64) -> Self {
        Self {
            offset: U32::new(offset),
            size: U32::new(size),
            id: I64::new(id),
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset.get()
    }

    pub fn set_offset(&mut self, offset: u32) {
        self.offset = U32::new(offset);
    }

    pub fn size(&self) -> u32 {
        self.size.get()
    }

    pub fn set_size(&mut self, size: u32) {
        self.size = U32::new(size);
    }

    pub fn id(&self) -> i64 {
        self.id.get()
    }

    /// End of the payload region, one past the last byte.
    pub fn end(&self) -> u64 {
        self.offset() as u64 + self.size() as u64
    }

    pub fn is_free(&self) -> bool {
        self.offset() == 0
    }

    /// Marks the slot unused.
    pub fn clear(&mut self) {
        *self = Self::new(0, 0, 0);
    }
}

/// The fixed array of entries at the start of every bucket file.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct BucketHeader {
    entries: [BucketEntry; BUCKET_CAPACITY],
}

const _: () = assert!(std::mem::size_of::<BucketHeader>() == BUCKET_HEADER_SIZE);

impl BucketHeader {
    /// A header holding a single record whose payload follows immediately.
    pub fn new_single(id: i64, size: u32) -> Self {
        let mut header = Self::empty();
        header.entries[0] = BucketEntry::new(BUCKET_HEADER_SIZE as u32, size, id);
        header
    }

    pub fn empty() -> Self {
        Self {
            entries: [BucketEntry::new(0, 0, 0); BUCKET_CAPACITY],
        }
    }

    pub fn from_bytes(bytes: &[u8; BUCKET_HEADER_SIZE]) -> Self {
        // Infallible: the buffer length equals the struct size and the
        // struct accepts any bit pattern.
        match Self::read_from_bytes(bytes) {
            Ok(header) => header,
            Err(_) => unreachable!("BucketHeader is exactly BUCKET_HEADER_SIZE bytes"),
        }
    }

    pub fn entry(&self, slot: usize) -> &BucketEntry {
        &self.entries[slot]
    }

    pub fn entry_mut(&mut self, slot: usize) -> &mut BucketEntry {
        &mut self.entries[slot]
    }

    /// Number of used slots. Used entries always occupy a prefix.
    pub fn count(&self) -> usize {
        self.entries
            .iter()
            .position(BucketEntry::is_free)
            .unwrap_or(BUCKET_CAPACITY)
    }

    /// Slot of `id` among the first `count` entries, if present.
    pub fn position_of(&self, id: i64, count: usize) -> Option<usize> {
        for (slot, entry) in self.entries[..count].iter().enumerate() {
            if entry.id() == id {
                return Some(slot);
            }
            if entry.id() > id {
                break;
            }
        }
        None
    }

    /// First slot whose id exceeds `id`; `count` when no such slot exists.
    /// This is where a new entry for `id` belongs.
    pub fn insertion_point(&self, id: i64, count: usize) -> usize {
        self.entries[..count]
            .iter()
            .position(|entry| entry.id() > id)
            .unwrap_or(count)
    }

    /// One past the last payload byte; the logical end of the bucket file.
    pub fn end_offset(&self, count: usize) -> u64 {
        if count == 0 {
            BUCKET_HEADER_SIZE as u64
        } else {
            self.entries[count - 1].end()
        }
    }
}

/// Checks every header invariant that can be verified without reading
/// payloads, returning the record count of a well-formed bucket.
///
/// Used entries must occupy a packed prefix, ids must be strictly ascending,
/// the first id must match the bucket's file name, and payload regions must
/// start right after the header and follow each other without gaps or
/// overlap.
pub fn validate_header(header: &BucketHeader, bucket_id: i64) -> Result<usize> {
    let count = header.count();
    ensure!(count > 0, "bucket holds no records");

    ensure!(
        header.entry(0).id() == bucket_id,
        "first record id {} does not match bucket id {}",
        header.entry(0).id(),
        bucket_id
    );

    let mut expected_offset = BUCKET_HEADER_SIZE as u64;
    let mut prev_id = None;

    for slot in 0..count {
        let entry = header.entry(slot);

        ensure!(
            entry.offset() as u64 == expected_offset,
            "entry {} payload at offset {} leaves a gap (expected {})",
            slot,
            entry.offset(),
            expected_offset
        );

        if let Some(prev) = prev_id {
            ensure!(
                entry.id() > prev,
                "entry {} id {} is not above its predecessor {}",
                slot,
                entry.id(),
                prev
            );
        }

        expected_offset = entry.end();
        prev_id = Some(entry.id());
    }

    for slot in count..BUCKET_CAPACITY {
        ensure!(
            header.entry(slot).is_free(),
            "slot {} is used but follows a free slot",
            slot
        );
    }

    Ok(count)
}

/// File name for the bucket owning `bucket_id`.
pub fn bucket_file_name(bucket_id: i64) -> String {
    format!("{:0width$}{}", bucket_id, BUCKET_FILE_EXTENSION, width = BUCKET_ID_DIGITS)
}

/// Parses a directory entry name back into a bucket id.
///
/// Accepts exactly [`BUCKET_ID_DIGITS`] decimal digits followed by the
/// bucket extension; everything else returns `None` and is ignored by
/// recovery.
pub fn parse_bucket_file_name(name: &str) -> Option<i64> {
    if name.len() != BUCKET_FILE_NAME_LEN || !name.ends_with(BUCKET_FILE_EXTENSION) {
        return None;
    }

    let digits = &name[..BUCKET_ID_DIGITS];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with(ids_and_sizes: &[(i64, u32)]) -> BucketHeader {
        let mut header = BucketHeader::empty();
        let mut offset = BUCKET_HEADER_SIZE as u32;
        for (slot, (id, size)) in ids_and_sizes.iter().enumerate() {
            *header.entry_mut(slot) = BucketEntry::new(offset, *size, *id);
            offset += size;
        }
        header
    }

    #[test]
    fn entry_size_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<BucketEntry>(), 16);
    }

    #[test]
    fn header_roundtrips_through_bytes() {
        let header = header_with(&[(3, 5), (9, 0), (12, 40)]);

        let mut bytes = [0u8; BUCKET_HEADER_SIZE];
        bytes.copy_from_slice(header.as_bytes());
        let parsed = BucketHeader::from_bytes(&bytes);

        assert_eq!(parsed.count(), 3);
        assert_eq!(parsed.entry(0).id(), 3);
        assert_eq!(parsed.entry(1).size(), 0);
        assert_eq!(parsed.entry(2).offset(), BUCKET_HEADER_SIZE as u32 + 5);
    }

    #[test]
    fn count_stops_at_first_free_slot() {
        let header = header_with(&[(1, 4), (2, 4)]);
        assert_eq!(header.count(), 2);

        assert_eq!(BucketHeader::empty().count(), 0);
    }

    #[test]
    fn position_of_finds_only_present_ids() {
        let header = header_with(&[(10, 1), (20, 1), (30, 1)]);

        assert_eq!(header.position_of(10, 3), Some(0));
        assert_eq!(header.position_of(30, 3), Some(2));
        assert_eq!(header.position_of(25, 3), None);
        assert_eq!(header.position_of(40, 3), None);
    }

    #[test]
    fn insertion_point_keeps_ids_sorted() {
        let header = header_with(&[(10, 1), (20, 1), (30, 1)]);

        assert_eq!(header.insertion_point(5, 3), 0);
        assert_eq!(header.insertion_point(15, 3), 1);
        assert_eq!(header.insertion_point(99, 3), 3);
    }

    #[test]
    fn end_offset_tracks_last_payload() {
        let header = header_with(&[(1, 7), (2, 3)]);
        assert_eq!(header.end_offset(2), BUCKET_HEADER_SIZE as u64 + 10);
        assert_eq!(BucketHeader::empty().end_offset(0), BUCKET_HEADER_SIZE as u64);
    }

    #[test]
    fn validate_accepts_well_formed_header() {
        let header = header_with(&[(101, 9), (102, 10)]);
        assert_eq!(validate_header(&header, 101).unwrap(), 2);
    }

    #[test]
    fn validate_rejects_empty_header() {
        assert!(validate_header(&BucketHeader::empty(), 0).is_err());
    }

    #[test]
    fn validate_rejects_mismatched_bucket_id() {
        let header = header_with(&[(101, 9)]);
        assert!(validate_header(&header, 100).is_err());
    }

    #[test]
    fn validate_rejects_unsorted_ids() {
        let mut header = header_with(&[(5, 4), (3, 4)]);
        // Offsets are consistent; only the id order is broken.
        assert_eq!(header.entry(1).offset(), BUCKET_HEADER_SIZE as u32 + 4);
        assert!(validate_header(&header, 5).is_err());

        // Duplicate ids are just as invalid.
        header = header_with(&[(5, 4), (5, 4)]);
        assert!(validate_header(&header, 5).is_err());
    }

    #[test]
    fn validate_rejects_gapped_payloads() {
        let mut header = header_with(&[(1, 4), (2, 4)]);
        header.entry_mut(1).set_offset(BUCKET_HEADER_SIZE as u32 + 8);
        assert!(validate_header(&header, 1).is_err());
    }

    #[test]
    fn validate_rejects_entry_after_free_slot() {
        let mut header = header_with(&[(1, 4)]);
        *header.entry_mut(2) = BucketEntry::new(BUCKET_HEADER_SIZE as u32 + 4, 4, 9);
        assert!(validate_header(&header, 1).is_err());
    }

    #[test]
    fn file_name_is_zero_padded() {
        assert_eq!(bucket_file_name(101), "00000000000000000101.db");
        assert_eq!(bucket_file_name(0), "00000000000000000000.db");
        assert_eq!(
            bucket_file_name(i64::MAX),
            "09223372036854775807.db"
        );
    }

    #[test]
    fn file_name_roundtrips() {
        for id in [0, 1, 101, 9_999_999, i64::MAX] {
            assert_eq!(parse_bucket_file_name(&bucket_file_name(id)), Some(id));
        }
    }

    #[test]
    fn foreign_names_are_rejected() {
        assert_eq!(parse_bucket_file_name("notes.txt"), None);
        assert_eq!(parse_bucket_file_name("123.db"), None);
        assert_eq!(parse_bucket_file_name("0000000000000000010a.db"), None);
        assert_eq!(parse_bucket_file_name("00000000000000000101.dbx"), None);
        assert_eq!(parse_bucket_file_name("00000000000000000101db"), None);
        assert_eq!(parse_bucket_file_name(""), None);
    }
}
