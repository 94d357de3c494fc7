//! # PailDB Configuration Constants
//!
//! This module centralizes the constants that define the on-disk bucket
//! format and the data directory naming scheme. Constants that depend on each
//! other are co-located and the derivations are enforced with compile-time
//! assertions, so a change to one value cannot silently desynchronize the
//! others.
//!
//! ## Dependency Graph
//!
//! ```text
//! BUCKET_CAPACITY (10)
//!       │
//!       └─> BUCKET_HEADER_SIZE (derived: BUCKET_ENTRY_SIZE * BUCKET_CAPACITY)
//!             The header is a fixed array of one entry per record slot.
//!             Payloads start at this offset, which is why a used entry can
//!             never carry offset 0 and why 0 doubles as the free-slot marker.
//!
//! BUCKET_ENTRY_SIZE (16 bytes)
//!       │
//!       └─> u32 offset + u32 size + i64 id, little-endian, packed
//!
//! BUCKET_ID_DIGITS (20)
//!       │
//!       └─> BUCKET_FILE_NAME_LEN (derived: digits + extension length)
//!             Recovery rejects any directory entry whose name is not exactly
//!             this long, so foreign files never enter the index.
//! ```
//!
//! ## Modifying Constants
//!
//! Changing any of these values changes the file format. Existing data
//! directories are not readable across such a change; there is no format
//! version field.

/// Maximum number of records a single bucket file can hold.
/// Inserting into a full bucket splits it instead of growing the header.
pub const BUCKET_CAPACITY: usize = 10;

/// Size of one header entry in bytes: u32 offset + u32 size + i64 id.
pub const BUCKET_ENTRY_SIZE: usize = 16;

/// Size of the fixed header at the start of every bucket file.
/// All record payloads are packed immediately after this offset.
pub const BUCKET_HEADER_SIZE: usize = BUCKET_ENTRY_SIZE * BUCKET_CAPACITY;

const _: () = assert!(
    BUCKET_HEADER_SIZE == BUCKET_ENTRY_SIZE * BUCKET_CAPACITY,
    "BUCKET_HEADER_SIZE derivation mismatch"
);

const _: () = assert!(
    BUCKET_HEADER_SIZE > 0,
    "a used entry relies on offset 0 being unreachable for payloads"
);

/// Width of the zero-padded decimal bucket id in a bucket file name.
/// 20 digits cover the full unsigned range of the 19-digit i64 maximum.
pub const BUCKET_ID_DIGITS: usize = 20;

/// Extension carried by every bucket file.
pub const BUCKET_FILE_EXTENSION: &str = ".db";

/// Exact length of a valid bucket file name.
pub const BUCKET_FILE_NAME_LEN: usize = BUCKET_ID_DIGITS + BUCKET_FILE_EXTENSION.len();

/// Name of the data directory created under the working directory by the
/// process-wide accessor.
pub const DATA_DIR_NAME: &str = "db";

/// Permission bits for newly created bucket files.
pub const BUCKET_FILE_MODE: u32 = 0o640;
