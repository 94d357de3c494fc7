//! # PailDB - Bucket-File Document Store
//!
//! PailDB is a small persistent document store keyed by a signed 64-bit id.
//! Records are packed into "pails": on-disk bucket files that each hold up
//! to ten records in ascending id order behind a fixed header. Point lookups
//! route through a sorted in-memory index rebuilt from the data directory on
//! open, so the store needs no catalog file and survives cold restarts.
//!
//! ## Quick Start
//!
//! ```ignore
//! use paildb::{Document, DocumentDb};
//!
//! let db = DocumentDb::open("./db")?;
//!
//! db.insert(&Document::new(101, &b"file1.txt"[..]))?;
//! assert!(db.exists(101));
//!
//! let doc = db.get(101)?;
//! db.update(101, b"file2.json")?;
//! db.remove(101)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │     Document Facade (DocumentDb)    │
//! ├─────────────────────────────────────┤
//! │   Bucket Engine (rewrite pipeline)  │
//! ├──────────────────┬──────────────────┤
//! │   Bucket Codec   │   Sorted Index   │
//! ├──────────────────┴──────────────────┤
//! │      Positional File I/O            │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! ```text
//! db/
//! ├── 00000000000000000101.db   # bucket named for its smallest id
//! └── 00000000000000000225.db
//! ```
//!
//! Every mutation rewrites the affected bucket's header and the payloads
//! behind the touched record. A full bucket splits on insert; a bucket
//! whose smallest record is removed is renamed; a bucket whose last record
//! is removed disappears.
//!
//! ## Module Overview
//!
//! - [`config`]: layout constants and the file naming scheme
//! - [`storage`]: bucket codec, sorted index, rewrite engine, recovery
//! - [`document`]: the `Document`/`DocumentDb` facade and the process-wide
//!   accessor

pub mod config;
pub mod document;
pub mod storage;

pub use document::{instance, Document, DocumentDb};
pub use storage::BucketEngine;
