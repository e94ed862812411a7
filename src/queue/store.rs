//! Bounded FIFO over a record store.

use serde::de::Error as _;
use thiserror::Error;

use crate::metrics::{QueueMetrics, StoreMetrics};
use crate::store::{JsonFileStore, RecordId, RecordRef, RecordStore, StoreError};

use super::models::{QueueConfig, QueueEntry, QueueRecord};

#[derive(Debug, Error)]
pub enum QueueStoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The head record exists but does not decode to a queued message
    #[error("Cannot decode record {id}: {source}")]
    PayloadParse {
        id: RecordId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot encode record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Message label must not be empty")]
    InvalidLabel,
}

/// Durable queue of outbound messages, oldest first.
///
/// Holds at most `max_count` entries: enqueueing into a full queue evicts
/// from the front first.
pub struct QueueStore {
    config: QueueConfig,
    store: Box<dyn RecordStore>,
    dead_letter: Option<Box<dyn RecordStore>>,
}

impl QueueStore {
    /// Open the file-backed queue described by `config`.
    ///
    /// Never fails: if the store file cannot be loaded the queue starts
    /// empty, and a malformed file is moved aside first.
    pub fn open(config: QueueConfig) -> Self {
        let store = open_file_store(&config.store_path, "open");
        let dead_letter = config
            .dead_letter_path
            .as_ref()
            .map(|path| Box::new(open_file_store(path, "open_dead_letter")) as Box<dyn RecordStore>);

        let queue = Self::with_stores(config, Box::new(store), dead_letter);
        tracing::info!(
            path = %queue.config.store_path.display(),
            depth = queue.count(),
            max_count = queue.config.max_count,
            "Queue store opened"
        );
        queue
    }

    /// Build over existing stores.
    pub fn with_stores(
        config: QueueConfig,
        store: Box<dyn RecordStore>,
        dead_letter: Option<Box<dyn RecordStore>>,
    ) -> Self {
        let queue = Self {
            config,
            store,
            dead_letter,
        };
        QueueMetrics::set_depth(queue.count());
        queue
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Backend identifier of the underlying store.
    pub fn kind(&self) -> &'static str {
        self.store.kind()
    }

    pub fn count(&self) -> usize {
        self.store.item_count()
    }

    /// Append a message, evicting the oldest entries if the queue is full.
    ///
    /// On success the new entry is durable. If it cannot be saved the
    /// insertion is undone and the error returned; evictions stay.
    pub fn enqueue(&mut self, label: &str, payload: &str) -> Result<RecordId, QueueStoreError> {
        if label.is_empty() {
            return Err(QueueStoreError::InvalidLabel);
        }

        self.trim_for_insert();

        let record = QueueRecord {
            label: label.to_string(),
            data: payload.to_string(),
            queued_at: Some(chrono::Utc::now()),
        };
        let data = serde_json::to_string(&record).map_err(QueueStoreError::Encode)?;

        let id = self
            .store
            .item_add(None, data)
            .inspect_err(|e| log_store_error("enqueue", "item_add", e))?;

        if let Err(e) = self.store.save() {
            log_store_error("enqueue", "save", &e);
            if let Err(rollback) = self.store.item_remove(RecordRef::Id(&id)) {
                log_store_error("enqueue", "item_remove", &rollback);
            }
            return Err(e.into());
        }

        QueueMetrics::record_enqueued();
        QueueMetrics::set_depth(self.count());
        tracing::debug!(id = %id, label = %label, depth = self.count(), "Message queued");
        Ok(id)
    }

    /// Evict from the front until there is room for one more entry.
    fn trim_for_insert(&mut self) {
        let mut evicted = 0u64;
        while self.store.item_count() >= self.config.max_count {
            match self.store.item_remove(RecordRef::Index(0)) {
                Ok(()) => evicted += 1,
                Err(e) => {
                    log_store_error("enqueue", "item_remove", &e);
                    break;
                }
            }
        }

        if evicted == 0 {
            return;
        }

        QueueMetrics::record_evicted(evicted);
        tracing::warn!(
            evicted = evicted,
            max_count = self.config.max_count,
            "Queue full, dropped oldest messages"
        );
        if let Err(e) = self.store.save() {
            log_store_error("enqueue", "save", &e);
        }
    }

    /// The oldest entry, if any. Does not modify the queue.
    pub fn peek_oldest(&self) -> Result<Option<QueueEntry>, QueueStoreError> {
        if self.store.item_count() == 0 {
            return Ok(None);
        }

        let item = self
            .store
            .item_get(RecordRef::Index(0))
            .inspect_err(|e| log_store_error("peek_oldest", "item_get", e))?;

        let record: QueueRecord =
            serde_json::from_str(&item.data).map_err(|source| QueueStoreError::PayloadParse {
                id: item.id.clone(),
                source,
            })?;
        if record.label.is_empty() {
            return Err(QueueStoreError::PayloadParse {
                id: item.id,
                source: serde_json::Error::custom("empty label"),
            });
        }

        Ok(Some(QueueEntry {
            id: item.id,
            label: record.label,
            payload: record.data,
            queued_at: record.queued_at,
        }))
    }

    /// Remove the entry with `id` and persist. Returns false if nothing was
    /// removed.
    pub fn remove_oldest(&mut self, id: &RecordId) -> bool {
        match self.store.item_remove(RecordRef::Id(id)) {
            Ok(()) => {}
            Err(StoreError::EntryMissing(_)) => {
                tracing::warn!(id = %id, "Entry to remove is no longer queued");
                return false;
            }
            Err(e) => {
                log_store_error("remove_oldest", "item_remove", &e);
                return false;
            }
        }

        // The removal stands; the next successful save persists it
        if let Err(e) = self.store.save() {
            log_store_error("remove_oldest", "save", &e);
        }

        QueueMetrics::set_depth(self.count());
        true
    }

    /// Move an undecodable record out of the queue.
    ///
    /// The raw record goes to the dead-letter store when one is configured
    /// and is discarded otherwise. If the dead-letter copy cannot be made
    /// durable, the record stays queued and false is returned.
    pub fn quarantine(&mut self, id: &RecordId) -> bool {
        let item = match self.store.item_get(RecordRef::Id(id)) {
            Ok(item) => item,
            Err(e) => {
                log_store_error("quarantine", "item_get", &e);
                return false;
            }
        };

        match self.dead_letter.as_mut() {
            Some(dead_letter) => {
                let dead_id = match dead_letter.item_add(Some(item.id.clone()), item.data.clone()) {
                    Ok(dead_id) => dead_id,
                    Err(StoreError::DuplicateId(_)) => {
                        match dead_letter.item_add(None, item.data.clone()) {
                            Ok(dead_id) => dead_id,
                            Err(e) => {
                                log_store_error("quarantine", "item_add", &e);
                                return false;
                            }
                        }
                    }
                    Err(e) => {
                        log_store_error("quarantine", "item_add", &e);
                        return false;
                    }
                };
                if let Err(e) = dead_letter.save() {
                    log_store_error("quarantine", "save", &e);
                    if let Err(rollback) = dead_letter.item_remove(RecordRef::Id(&dead_id)) {
                        log_store_error("quarantine", "item_remove", &rollback);
                    }
                    return false;
                }
                tracing::warn!(id = %id, dead_letter_id = %dead_id, "Record moved to dead letter store");
            }
            None => {
                tracing::error!(id = %id, data = %item.data, "Discarding undecodable record");
            }
        }

        if let Err(e) = self.store.item_remove(RecordRef::Id(id)) {
            log_store_error("quarantine", "item_remove", &e);
            return false;
        }
        if let Err(e) = self.store.save() {
            log_store_error("quarantine", "save", &e);
        }

        QueueMetrics::record_quarantined();
        QueueMetrics::set_depth(self.count());
        true
    }

    /// Persist the current contents.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.store
            .save()
            .inspect_err(|e| log_store_error("flush", "save", e))
    }
}

/// Open a JSON file store.
///
/// A corrupt file is moved aside. Any other failure leaves the file in place;
/// both cases start empty.
fn open_file_store(path: &std::path::Path, operation: &'static str) -> JsonFileStore {
    match JsonFileStore::open(path) {
        Ok(store) => store,
        Err(e @ StoreError::Corrupt { .. }) => {
            log_store_error(operation, "open", &e);
            match JsonFileStore::quarantine_corrupt(path) {
                Ok(Some(moved)) => tracing::warn!(
                    path = %path.display(),
                    moved_to = %moved.display(),
                    "Corrupt store file moved aside, starting empty"
                ),
                Ok(None) => {}
                Err(e) => log_store_error(operation, "quarantine_corrupt", &e),
            }
            JsonFileStore::empty(path)
        }
        Err(e) => {
            log_store_error(operation, "open", &e);
            tracing::warn!(
                path = %path.display(),
                "Store file could not be read, starting empty and leaving it in place"
            );
            JsonFileStore::empty(path)
        }
    }
}

fn log_store_error(operation: &'static str, function: &'static str, error: &StoreError) {
    StoreMetrics::record_error(operation);
    tracing::error!(
        operation = operation,
        function = function,
        error = %error,
        "Record store operation failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::test_support::FlakyStore;
    use crate::store::MemoryRecordStore;
    use std::fs;
    use tempfile::tempdir;

    fn memory_queue(max_count: usize) -> QueueStore {
        QueueStore::with_stores(
            QueueConfig {
                max_count,
                ..Default::default()
            },
            Box::new(MemoryRecordStore::new()),
            None,
        )
    }

    fn drain_labels(queue: &mut QueueStore) -> Vec<String> {
        let mut labels = Vec::new();
        while let Some(entry) = queue.peek_oldest().unwrap() {
            assert!(queue.remove_oldest(&entry.id));
            labels.push(entry.label);
        }
        labels
    }

    #[test]
    fn test_enqueue_evicts_oldest_when_full() {
        let mut queue = memory_queue(3);
        for label in ["A", "B", "C", "D"] {
            queue.enqueue(label, "payload").unwrap();
            assert!(queue.count() <= 3);
        }

        assert_eq!(queue.count(), 3);
        assert_eq!(drain_labels(&mut queue), vec!["B", "C", "D"]);
    }

    #[test]
    fn test_capacity_of_one_keeps_newest() {
        let mut queue = memory_queue(1);
        queue.enqueue("X", "1").unwrap();
        queue.enqueue("Y", "2").unwrap();

        let entry = queue.peek_oldest().unwrap().unwrap();
        assert_eq!(entry.label, "Y");
        assert_eq!(entry.payload, "2");
        assert_eq!(queue.count(), 1);
    }

    #[test]
    fn test_empty_label_is_rejected() {
        let mut queue = memory_queue(3);
        assert!(matches!(
            queue.enqueue("", "payload"),
            Err(QueueStoreError::InvalidLabel)
        ));
        assert_eq!(queue.count(), 0);
    }

    #[test]
    fn test_peek_does_not_remove() {
        let mut queue = memory_queue(3);
        let id = queue.enqueue("sensors", "{\"t\":21}").unwrap();

        let first = queue.peek_oldest().unwrap().unwrap();
        let second = queue.peek_oldest().unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.id, id);
        assert!(first.queued_at.is_some());
        assert_eq!(queue.count(), 1);
    }

    #[test]
    fn test_remove_unknown_id_returns_false() {
        let mut queue = memory_queue(3);
        queue.enqueue("a", "1").unwrap();

        assert!(!queue.remove_oldest(&RecordId::from("missing")));
        assert_eq!(queue.count(), 1);
    }

    #[test]
    fn test_enqueue_rolls_back_when_save_fails() {
        let store = FlakyStore::new();
        let controls = store.controls();
        let mut queue = QueueStore::with_stores(
            QueueConfig {
                max_count: 5,
                ..Default::default()
            },
            Box::new(store),
            None,
        );

        queue.enqueue("a", "1").unwrap();
        controls.fail_save(true);

        assert!(matches!(
            queue.enqueue("b", "2"),
            Err(QueueStoreError::Store(StoreError::Io { .. }))
        ));
        assert_eq!(queue.count(), 1);
        assert_eq!(queue.peek_oldest().unwrap().unwrap().label, "a");
    }

    #[test]
    fn test_eviction_failure_stops_trim() {
        let store = FlakyStore::new();
        let controls = store.controls();
        let mut queue = QueueStore::with_stores(
            QueueConfig {
                max_count: 2,
                ..Default::default()
            },
            Box::new(store),
            None,
        );

        queue.enqueue("a", "1").unwrap();
        queue.enqueue("b", "2").unwrap();
        controls.fail_remove(true);

        // Bound is exceeded until a later enqueue can evict again
        queue.enqueue("c", "3").unwrap();
        assert_eq!(queue.count(), 3);

        controls.fail_remove(false);
        queue.enqueue("d", "4").unwrap();
        assert_eq!(queue.count(), 2);
        assert_eq!(drain_labels(&mut queue), vec!["c", "d"]);
    }

    #[test]
    fn test_remove_stands_when_save_fails() {
        let store = FlakyStore::new();
        let controls = store.controls();
        let mut queue = QueueStore::with_stores(QueueConfig::default(), Box::new(store), None);

        let id = queue.enqueue("a", "1").unwrap();
        controls.fail_save(true);

        assert!(queue.remove_oldest(&id));
        assert_eq!(queue.count(), 0);
    }

    #[test]
    fn test_undecodable_head_is_reported_with_id() {
        let mut store = MemoryRecordStore::new();
        let bad = store.item_add(None, "not a record".to_string()).unwrap();
        store
            .item_add(None, r#"{"label":"","data":"x"}"#.to_string())
            .unwrap();
        let queue_store: Box<dyn RecordStore> = Box::new(store);
        let mut queue = QueueStore::with_stores(QueueConfig::default(), queue_store, None);

        match queue.peek_oldest() {
            Err(QueueStoreError::PayloadParse { id, .. }) => assert_eq!(id, bad),
            other => panic!("expected parse error, got {:?}", other),
        }

        assert!(queue.quarantine(&bad));
        assert!(matches!(
            queue.peek_oldest(),
            Err(QueueStoreError::PayloadParse { .. })
        ));
    }

    #[test]
    fn test_quarantine_moves_record_to_dead_letter() {
        let mut store = MemoryRecordStore::new();
        let bad = store.item_add(None, "garbage".to_string()).unwrap();
        let dead_letter = FlakyStore::new();
        let dead_controls = dead_letter.controls();
        let mut queue = QueueStore::with_stores(
            QueueConfig::default(),
            Box::new(store),
            Some(Box::new(dead_letter)),
        );

        dead_controls.fail_save(true);
        assert!(!queue.quarantine(&bad));
        assert_eq!(queue.count(), 1);
        assert_eq!(dead_controls.count(), 0);

        dead_controls.fail_save(false);
        assert!(queue.quarantine(&bad));
        assert_eq!(queue.count(), 0);
        assert_eq!(dead_controls.count(), 1);
    }

    #[test]
    fn test_quarantine_logs_failed_dead_letter_rollback() {
        let mut store = MemoryRecordStore::new();
        let bad = store.item_add(None, "garbage".to_string()).unwrap();
        let dead_letter = FlakyStore::new();
        let dead_controls = dead_letter.controls();
        let mut queue = QueueStore::with_stores(
            QueueConfig::default(),
            Box::new(store),
            Some(Box::new(dead_letter)),
        );

        let errors = || {
            crate::metrics::STORE_ERRORS_TOTAL
                .with_label_values(&["quarantine"])
                .get()
        };
        let before = errors();

        dead_controls.fail_save(true);
        dead_controls.fail_remove(true);
        assert!(!queue.quarantine(&bad));

        // Both the failed save and the failed rollback are recorded
        assert!(errors() >= before + 2);
        assert_eq!(queue.count(), 1);
        assert_eq!(dead_controls.count(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let config = QueueConfig {
            store_path: dir.path().join("spool.json"),
            max_count: 3,
            ..Default::default()
        };

        let mut queue = QueueStore::open(config.clone());
        for label in ["A", "B", "C", "D"] {
            queue.enqueue(label, "p").unwrap();
        }
        drop(queue);

        let mut reopened = QueueStore::open(config);
        assert_eq!(reopened.kind(), "json_file");
        assert_eq!(drain_labels(&mut reopened), vec!["B", "C", "D"]);
    }

    #[test]
    fn test_corrupt_file_is_moved_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spool.json");
        fs::write(&path, "][").unwrap();

        let mut queue = QueueStore::open(QueueConfig {
            store_path: path.clone(),
            ..Default::default()
        });
        assert_eq!(queue.count(), 0);
        assert!(dir.path().join("spool.json.corrupt").exists());

        queue.enqueue("a", "1").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_unreadable_store_is_left_in_place() {
        let dir = tempdir().unwrap();
        // Reading a directory fails with an I/O error rather than NotFound
        let path = dir.path().join("spool.json");
        fs::create_dir(&path).unwrap();

        let queue = QueueStore::open(QueueConfig {
            store_path: path.clone(),
            ..Default::default()
        });

        assert_eq!(queue.count(), 0);
        assert!(path.is_dir());
        assert!(!dir.path().join("spool.json.corrupt").exists());
    }
}
