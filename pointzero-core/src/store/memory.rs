use std::collections::BTreeMap;

use super::{KeyValueStore, StoreError, entry_size};

/// In-memory [`KeyValueStore`] with an optional byte quota.
///
/// Quota accounting sums key and value lengths, which is enough to exercise
/// the cache's eviction path without a real browser-style storage limit.
///
/// # Examples
/// ```
/// use pointzero_core::store::{KeyValueStore, MemoryStore};
///
/// let mut store = MemoryStore::with_quota(8);
/// store.set("a", "1234").expect("fits in quota");
/// assert!(store.set("b", "12345678").is_err());
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// Create an unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store refusing writes beyond `quota` bytes.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(quota),
        }
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently occupied.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|(key, value)| entry_size(key, value))
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(quota) = self.quota {
            let replaced = self
                .entries
                .get(key)
                .map_or(0, |previous| entry_size(key, previous));
            let required = self.used_bytes() - replaced + entry_size(key, value);
            if required > quota {
                return Err(StoreError::QuotaExceeded { quota, required });
            }
        }
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn lists_keys_by_prefix() {
        let mut store = MemoryStore::new();
        for key in ["b_1", "a_2", "a_1", "c"] {
            store.set(key, "v").expect("set");
        }
        assert_eq!(
            store.keys_with_prefix("a_").expect("keys"),
            ["a_1", "a_2"]
        );
    }

    #[rstest]
    fn replacing_a_value_reuses_its_quota() {
        let mut store = MemoryStore::with_quota(6);
        store.set("k", "12345").expect("initial write fits");
        store.set("k", "54321").expect("replacement fits");
        assert_eq!(store.get("k").expect("get").as_deref(), Some("54321"));
    }

    #[rstest]
    fn rejects_writes_beyond_quota() {
        let mut store = MemoryStore::with_quota(4);
        store.set("a", "12").expect("fits");
        let err = store.set("b", "12").expect_err("exceeds quota");
        assert!(matches!(
            err,
            StoreError::QuotaExceeded {
                quota: 4,
                required: 6
            }
        ));
        assert_eq!(store.len(), 1);
    }

    #[rstest]
    fn removing_missing_key_is_ok() {
        let mut store = MemoryStore::new();
        assert!(store.remove("missing").is_ok());
    }
}
