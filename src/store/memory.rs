use super::{RecordStore, StoreError};
use crate::models::PersistedRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process store for dry runs and tests. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, PersistedRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with records considered already processed
    pub fn with_records(records: impl IntoIterator<Item = PersistedRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.records.lock() {
            map.extend(records.into_iter().map(|r| (r.id.clone(), r)));
        }
        store
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, PersistedRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<PersistedRecord>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, record: &PersistedRecord) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), record.clone());
        Ok(())
    }
}
