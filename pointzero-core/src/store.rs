//! Injected string key-value persistence.
//!
//! The `KeyValueStore` trait is the only persistence surface the annotation
//! cache depends on. [`MemoryStore`] keeps entries in a map and is used by
//! tests and short-lived sessions; `SqliteStore` (behind the `store-sqlite`
//! feature) persists entries in a single table.

use thiserror::Error;

mod memory;
#[cfg(feature = "store-sqlite")]
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteStore, SqliteStoreError};

/// Errors surfaced by [`KeyValueStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writing the entry would exceed the store's byte quota.
    #[error("storage quota of {quota} bytes exceeded (needed {required})")]
    QuotaExceeded {
        /// Configured quota in bytes.
        quota: usize,
        /// Bytes the store would occupy after the write.
        required: usize,
    },
    /// The backing storage failed.
    #[error("storage backend failed during {operation}")]
    Backend {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Minimal string key-value persistence.
pub trait KeyValueStore {
    /// Fetch the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key succeeds.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    /// List every key starting with `prefix`, in ascending order.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Bytes an entry contributes towards a quota.
pub(crate) const fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}
