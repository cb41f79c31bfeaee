//! Storage adapter contract.
//!
//! The scheduler never decides *where* records live. It reads and writes one
//! [`ItemRecord`] per [`ItemId`] through a [`Storage`] implementation handed to
//! [`crate::MemoryModel::new`]. Methods take `&self`; adapters use interior
//! mutability for writes.
//!
//! Two adapters ship with the crate:
//! - [`InMemoryStore`] - a `HashMap` behind a lock, for tests and ephemeral sessions.
//! - [`crate::persistence::SqliteStore`] - durable, namespaced, checksummed.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::Result;
use crate::types::{ItemId, ItemRecord};

/// Durable key-value store for item records.
///
/// Errors propagate to the caller unchanged; the scheduler never retries.
pub trait Storage {
    /// Fetch the record for `id`, `None` if the item was never answered.
    ///
    /// # Errors
    /// Adapter-specific read or decode failures.
    fn get(&self, id: &ItemId) -> Result<Option<ItemRecord>>;

    /// Insert or overwrite the record for `id`.
    ///
    /// # Errors
    /// Adapter-specific write or encode failures.
    fn set(&self, id: &ItemId, record: &ItemRecord) -> Result<()>;

    /// Warm-up hint: the caller is about to read these items.
    ///
    /// Safe to ignore; the default does nothing.
    ///
    /// # Errors
    /// Adapter-specific read failures.
    fn preload(&self, _ids: &[ItemId]) -> Result<()> {
        Ok(())
    }
}

impl<S: Storage + ?Sized> Storage for &S {
    fn get(&self, id: &ItemId) -> Result<Option<ItemRecord>> {
        (**self).get(id)
    }

    fn set(&self, id: &ItemId, record: &ItemRecord) -> Result<()> {
        (**self).set(id, record)
    }

    fn preload(&self, ids: &[ItemId]) -> Result<()> {
        (**self).preload(ids)
    }
}

impl<S: Storage + ?Sized> Storage for std::sync::Arc<S> {
    fn get(&self, id: &ItemId) -> Result<Option<ItemRecord>> {
        (**self).get(id)
    }

    fn set(&self, id: &ItemId, record: &ItemRecord) -> Result<()> {
        (**self).set(id, record)
    }

    fn preload(&self, ids: &[ItemId]) -> Result<()> {
        (**self).preload(ids)
    }
}

/// Volatile in-process store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<ItemId, ItemRecord>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no record has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Copy of every stored record, e.g. for export.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<ItemId, ItemRecord> {
        self.records.read().clone()
    }
}

impl Storage for InMemoryStore {
    fn get(&self, id: &ItemId) -> Result<Option<ItemRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    fn set(&self, id: &ItemId, record: &ItemRecord) -> Result<()> {
        self.records.write().insert(id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(seen: u32) -> ItemRecord {
        ItemRecord {
            ewma: 1500.0,
            stability: 4.0,
            last_seen_at: Utc::now(),
            last_correct_at: None,
            seen_count: seen,
            correct_count: 0,
        }
    }

    #[test]
    fn get_missing_is_none() {
        let store = InMemoryStore::new();
        assert!(store.get(&ItemId::from("x")).expect("get").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn set_overwrites() {
        let store = InMemoryStore::new();
        let id = ItemId::from("x");
        store.set(&id, &record(1)).expect("set");
        store.set(&id, &record(2)).expect("set");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id).expect("get").expect("some").seen_count, 2);
    }

    #[test]
    fn default_preload_is_noop() {
        let store = InMemoryStore::new();
        store.preload(&[ItemId::from("a")]).expect("preload");
        assert!(store.is_empty());
    }

    #[test]
    fn shared_references_forward() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let id = ItemId::from("y");
        let by_ref: &InMemoryStore = &store;
        by_ref.set(&id, &record(1)).expect("set");
        assert!(store.get(&id).expect("get").is_some());
        assert_eq!(store.snapshot().len(), 1);
    }
}
