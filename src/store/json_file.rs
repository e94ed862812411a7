//! File-backed record store.
//!
//! The whole store is one JSON document:
//!
//! ```json
//! {"version": 1, "items": [{"id": "…", "data": "…"}]}
//! ```
//!
//! Items are kept in insertion order. `save` writes the document to a
//! sibling `.tmp` file, fsyncs it and renames it over the original, so a
//! crash leaves either the previous or the new contents on disk.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::memory::MemoryRecordStore;
use super::{RecordId, RecordRef, RecordStore, StoreError, StoredItem};

const FORMAT_VERSION: u32 = 1;

#[derive(Deserialize)]
struct StoreFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    items: VecDeque<StoredItem>,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: u32,
    items: &'a VecDeque<StoredItem>,
}

/// Record store persisted as a single JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: MemoryRecordStore,
}

impl JsonFileStore {
    /// Open the store at `path`.
    ///
    /// A missing file yields an empty store; the file is created by the
    /// first `save`. An unreadable or malformed file is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Store file not found, starting empty");
                return Ok(Self::empty(path));
            }
            Err(source) => return Err(io_error(&path, source)),
        };

        let file: StoreFile = serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: path.display().to_string(),
            source,
        })?;

        if file.version > FORMAT_VERSION {
            tracing::warn!(
                path = %path.display(),
                version = file.version,
                supported = FORMAT_VERSION,
                "Store file written by a newer format version"
            );
        }

        tracing::debug!(
            path = %path.display(),
            items = file.items.len(),
            "Loaded store file"
        );

        Ok(Self {
            path,
            records: MemoryRecordStore::from_items(file.items),
        })
    }

    /// An empty store bound to `path`. Nothing is written until `save`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: MemoryRecordStore::new(),
        }
    }

    /// Move a malformed store file aside to `<path>.corrupt`.
    ///
    /// Returns the new location, or `None` if there was no file.
    pub fn quarantine_corrupt(path: impl AsRef<Path>) -> Result<Option<PathBuf>, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let target = sibling(path, "corrupt");
        fs::rename(path, &target).map_err(|source| io_error(path, source))?;
        Ok(Some(target))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for JsonFileStore {
    fn kind(&self) -> &'static str {
        "json_file"
    }

    fn item_count(&self) -> usize {
        self.records.item_count()
    }

    fn item_add(&mut self, id: Option<RecordId>, data: String) -> Result<RecordId, StoreError> {
        self.records.item_add(id, data)
    }

    fn item_get(&self, reference: RecordRef<'_>) -> Result<StoredItem, StoreError> {
        self.records.item_get(reference)
    }

    fn item_remove(&mut self, reference: RecordRef<'_>) -> Result<(), StoreError> {
        self.records.item_remove(reference)
    }

    fn save(&mut self) -> Result<(), StoreError> {
        let document = StoreFileRef {
            version: FORMAT_VERSION,
            items: self.records.items(),
        };
        let data = serde_json::to_vec(&document).map_err(|source| StoreError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }

        let tmp = sibling(&self.path, "tmp");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .map_err(|source| io_error(&tmp, source))?;
        file.write_all(&data)
            .and_then(|_| file.sync_all())
            .map_err(|source| io_error(&tmp, source))?;
        fs::rename(&tmp, &self.path).map_err(|source| io_error(&self.path, source))?;

        tracing::trace!(
            path = %self.path.display(),
            items = self.records.item_count(),
            bytes = data.len(),
            "Store saved"
        );
        Ok(())
    }
}

/// `<path>.<suffix>`, keeping the original extension.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.item_count(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_save_and_reopen_preserves_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        let first = store.item_add(None, "first".to_string()).unwrap();
        let second = store.item_add(None, "second".to_string()).unwrap();
        store.save().unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.item_count(), 2);
        assert_eq!(reopened.item_get(RecordRef::Index(0)).unwrap().id, first);
        assert_eq!(reopened.item_get(RecordRef::Index(1)).unwrap().id, second);
        assert!(!sibling(&path, "tmp").exists());
    }

    #[test]
    fn test_unsaved_changes_are_not_durable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.item_add(None, "kept".to_string()).unwrap();
        store.save().unwrap();
        store.item_add(None, "lost".to_string()).unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.item_count(), 1);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/queue.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.item_add(None, "x".to_string()).unwrap();
        store.save().unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_corrupt_file_is_rejected_and_can_be_quarantined() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.json");
        fs::write(&path, "{not json").unwrap();

        let result = JsonFileStore::open(&path);
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));

        let moved = JsonFileStore::quarantine_corrupt(&path).unwrap().unwrap();
        assert!(!path.exists());
        assert!(moved.exists());
        assert!(moved.to_string_lossy().ends_with("queue.json.corrupt"));

        assert!(JsonFileStore::quarantine_corrupt(&path).unwrap().is_none());
    }

    #[test]
    fn test_document_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store
            .item_add(Some(RecordId::from("r1")), "payload".to_string())
            .unwrap();
        store.save().unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["items"][0]["id"], "r1");
        assert_eq!(value["items"][0]["data"], "payload");
    }
}
