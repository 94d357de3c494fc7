//! # Document Facade
//!
//! The public face of the store: a [`Document`] couples a signed 64-bit id
//! with an opaque payload, and [`DocumentDb`] exposes the five point
//! operations over the bucket engine. Payloads are copied in and out; the
//! engine owns the bytes on disk.
//!
//! A process-wide instance rooted at `./db` under the working directory is
//! available through [`instance`].

use std::path::Path;
use std::sync::OnceLock;

use eyre::{bail, Result};

use crate::config::DATA_DIR_NAME;
use crate::storage::BucketEngine;

/// One stored record: an id and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: i64,
    pub data: Vec<u8>,
}

impl Document {
    pub fn new(id: i64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }
}

/// Disk-backed document database.
pub struct DocumentDb {
    engine: BucketEngine,
}

impl DocumentDb {
    /// Opens (or creates) a store rooted at `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Ok(Self {
            engine: BucketEngine::open(data_dir)?,
        })
    }

    /// Whether a document with `id` is stored.
    pub fn exists(&self, id: i64) -> bool {
        self.engine.exists(id)
    }

    /// Fetches the document with `id`; an absent id is an error.
    pub fn get(&self, id: i64) -> Result<Document> {
        match self.engine.get(id)? {
            Some(data) => Ok(Document { id, data }),
            None => bail!("document {id} not found"),
        }
    }

    /// Stores a new document. Inserting an existing id replaces its payload.
    pub fn insert(&self, document: &Document) -> Result<()> {
        self.engine.insert(document.id, &document.data)
    }

    /// Replaces a document's payload. Updating an absent id stores it.
    pub fn update(&self, id: i64, data: &[u8]) -> Result<()> {
        self.engine.update(id, data)
    }

    /// Deletes the document with `id`; an absent id is an error.
    pub fn remove(&self, id: i64) -> Result<()> {
        self.engine.remove(id)
    }
}

static INSTANCE: OnceLock<DocumentDb> = OnceLock::new();

/// The process-wide store, rooted at `db/` under the working directory.
///
/// Aborts the process if the working directory cannot be resolved or the
/// data directory is unusable; the store cannot make progress without it.
pub fn instance() -> &'static DocumentDb {
    INSTANCE.get_or_init(|| {
        let cwd = std::env::current_dir().expect("working directory is not accessible");
        DocumentDb::open(cwd.join(DATA_DIR_NAME)).expect("failed to open the document store")
    })
}
