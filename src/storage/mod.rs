//! # Storage Module
//!
//! This module implements the bucket-file storage layer: records keyed by a
//! signed 64-bit id are grouped into small on-disk files ("buckets"), each
//! holding up to [`crate::config::BUCKET_CAPACITY`] records in ascending id
//! order behind a fixed-size header.
//!
//! ## Directory Layout
//!
//! ```text
//! data_dir/
//! ├── 00000000000000000000.db   # bucket owning ids [0, 10)
//! ├── 00000000000000000010.db   # bucket owning ids [10, 25)
//! └── 00000000000000000025.db   # bucket owning ids [25, ∞)
//! ```
//!
//! Each file is named after the smallest id it contains, which is what lets
//! a single predecessor lookup in the sorted in-memory index route any id to
//! its owning bucket. The id ranges above are implied by the neighbouring
//! bucket names, not stored anywhere.
//!
//! ## Module Organization
//!
//! - `fs`: positional file I/O (exact reads/writes at offsets, truncate,
//!   rename) with per-path error context
//! - `bucket`: the on-disk header codec and the bucket file naming scheme
//! - `index`: the sorted bucket-id → record-count map
//! - `engine`: the rewrite pipeline for insert/update/remove, plus recovery
//!
//! ## Consistency Model
//!
//! A single exclusive lock serialises all operations, so on-disk state is
//! the cumulative effect of a total order of rewrites. Individual rewrites
//! are not atomic against crashes; recovery validates every header it reads
//! and drops buckets that fail, keeping the rest of the store usable.

mod bucket;
mod engine;
mod fs;
mod index;

pub use bucket::{
    bucket_file_name, parse_bucket_file_name, validate_header, BucketEntry, BucketHeader,
};
pub use engine::BucketEngine;
pub use index::BucketIndex;
