//! Durable record store backing the offline queue.
//!
//! The queue never touches the disk directly. It talks to a [`RecordStore`],
//! an ordered keyed log with explicit `save` points:
//!
//! - `JsonFileStore`: single JSON file, atomically replaced on every save
//! - `MemoryRecordStore`: volatile storage, used for tests and when no
//!   persistence is wanted
//!
//! Items are opaque strings; the queue layer owns their encoding.

mod json_file;
mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use json_file::JsonFileStore;
pub use memory::MemoryRecordStore;

/// Identifier assigned to a record on insertion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a record, either by position (0 = oldest) or by identity.
#[derive(Debug, Clone, Copy)]
pub enum RecordRef<'a> {
    Index(usize),
    Id(&'a RecordId),
}

impl fmt::Display for RecordRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordRef::Index(index) => write!(f, "index {}", index),
            RecordRef::Id(id) => write!(f, "id {}", id),
        }
    }
}

/// A record as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    pub id: RecordId,
    pub data: String,
}

/// Errors raised by record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but cannot be decoded
    #[error("Corrupt store file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// No record matches the reference
    #[error("No record at {0}")]
    EntryMissing(String),

    /// A caller-supplied id is already present
    #[error("Duplicate record id {0}")]
    DuplicateId(RecordId),
}

impl StoreError {
    pub(crate) fn missing(reference: RecordRef<'_>) -> Self {
        StoreError::EntryMissing(reference.to_string())
    }
}

/// Ordered, keyed record storage with explicit durability points.
///
/// Mutations only change the in-memory view; [`RecordStore::save`] makes the
/// current contents durable. Implementations are driven by a single owner
/// and need not be internally synchronized.
pub trait RecordStore: Send {
    /// Short backend identifier used in logs and stats.
    fn kind(&self) -> &'static str;

    /// Number of records currently held.
    fn item_count(&self) -> usize;

    /// Append a record. A fresh id is generated when `id` is `None`.
    fn item_add(&mut self, id: Option<RecordId>, data: String) -> Result<RecordId, StoreError>;

    /// Fetch a record without removing it.
    fn item_get(&self, reference: RecordRef<'_>) -> Result<StoredItem, StoreError>;

    /// Remove a record.
    fn item_remove(&mut self, reference: RecordRef<'_>) -> Result<(), StoreError>;

    /// Persist the current contents.
    fn save(&mut self) -> Result<(), StoreError>;
}
