//! Persistence boundary for analyzed listings.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::models::PersistedRecord;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unreachable: {0}")]
    Unavailable(String),

    #[error("Store API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode stored record {key}: {message}")]
    Decode { key: String, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Key-value store with an existence check, keyed by listing identifier
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Pure read; never mutates
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<PersistedRecord>, StoreError>;

    /// Unconditional upsert; last write wins
    async fn set(&self, key: &str, record: &PersistedRecord) -> Result<(), StoreError>;
}
