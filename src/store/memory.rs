//! Volatile record store.
//!
//! Contents are lost when the process exits. `save` is a no-op.

use std::collections::VecDeque;

use super::{RecordId, RecordRef, RecordStore, StoreError, StoredItem};

/// In-memory record store kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    items: VecDeque<StoredItem>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn from_items(items: VecDeque<StoredItem>) -> Self {
        Self { items }
    }

    pub(super) fn items(&self) -> &VecDeque<StoredItem> {
        &self.items
    }

    fn position(&self, reference: RecordRef<'_>) -> Option<usize> {
        match reference {
            RecordRef::Index(index) if index < self.items.len() => Some(index),
            RecordRef::Index(_) => None,
            RecordRef::Id(id) => self.items.iter().position(|item| &item.id == id),
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn item_add(&mut self, id: Option<RecordId>, data: String) -> Result<RecordId, StoreError> {
        let id = id.unwrap_or_else(RecordId::generate);
        if self.position(RecordRef::Id(&id)).is_some() {
            return Err(StoreError::DuplicateId(id));
        }
        self.items.push_back(StoredItem {
            id: id.clone(),
            data,
        });
        Ok(id)
    }

    fn item_get(&self, reference: RecordRef<'_>) -> Result<StoredItem, StoreError> {
        self.position(reference)
            .map(|pos| self.items[pos].clone())
            .ok_or_else(|| StoreError::missing(reference))
    }

    fn item_remove(&mut self, reference: RecordRef<'_>) -> Result<(), StoreError> {
        let pos = self
            .position(reference)
            .ok_or_else(|| StoreError::missing(reference))?;
        self.items.remove(pos);
        Ok(())
    }

    fn save(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
