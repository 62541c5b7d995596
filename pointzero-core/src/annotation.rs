//! Time-bounded cache of per-record annotations.
//!
//! Annotations (for example generated descriptions) are keyed by record id
//! and the annotation provider, stored as JSON in a [`KeyValueStore`], and
//! expire lazily 30 days after creation. Storage failures never escape the
//! cache: reads degrade to a miss and writes report [`CacheWrite::Dropped`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::store::{KeyValueStore, StoreError};

/// Namespace prefix shared by every cache key.
pub const DEFAULT_PREFIX: &str = "ai_desc_";
/// Format version embedded in keys and values.
pub const CACHE_VERSION: &str = "v1";
/// Lifetime of a cached annotation.
pub const MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock {
    /// Current time.
    fn now_millis(&self) -> u64;
}

/// [`Clock`] backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// Identifies one annotation: the record and the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationKey {
    /// Record identifier such as `osm_123`.
    pub record_id: String,
    /// Annotation provider key such as `gemini`.
    pub provider: String,
}

impl AnnotationKey {
    /// Build a key.
    #[must_use]
    pub fn new(record_id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            provider: provider.into(),
        }
    }
}

/// Stored annotation with its creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAnnotation {
    /// Record the annotation describes.
    pub record_id: String,
    /// Provider that produced the text.
    pub provider: String,
    /// Annotation text.
    pub text: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Cache format version.
    pub version: String,
}

/// Outcome of [`AnnotationCache::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    /// Stored on the first attempt.
    Stored,
    /// Stored after evicting the oldest entries.
    StoredAfterEviction {
        /// Entries removed to make room.
        evicted: usize,
    },
    /// The store refused the entry; it was not cached.
    Dropped,
}

/// TTL cache over an injected [`KeyValueStore`].
///
/// # Examples
/// ```
/// use pointzero_core::annotation::{AnnotationCache, AnnotationKey, SystemClock};
/// use pointzero_core::store::MemoryStore;
///
/// let mut cache = AnnotationCache::new(MemoryStore::new(), SystemClock);
/// let key = AnnotationKey::new("osm_1", "gemini");
/// cache.put(&key, "A barracks complex.");
/// assert_eq!(cache.get(&key).map(|hit| hit.text).as_deref(), Some("A barracks complex."));
/// ```
#[derive(Debug)]
pub struct AnnotationCache<S, C = SystemClock> {
    store: S,
    clock: C,
    prefix: String,
    max_age: Duration,
}

impl<S: KeyValueStore, C: Clock> AnnotationCache<S, C> {
    /// Wrap `store` using the default namespace and lifetime.
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            prefix: DEFAULT_PREFIX.to_owned(),
            max_age: MAX_AGE,
        }
    }

    /// Use a different key namespace.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Use a different entry lifetime.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Borrow the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Consume the cache, returning the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Storage key for `key`.
    #[must_use]
    pub fn storage_key(&self, key: &AnnotationKey) -> String {
        format!(
            "{}{CACHE_VERSION}_{}_{}",
            self.prefix, key.record_id, key.provider
        )
    }

    /// Look up a fresh annotation.
    ///
    /// Expired and malformed entries are removed and reported as a miss.
    pub fn get(&mut self, key: &AnnotationKey) -> Option<CachedAnnotation> {
        let storage_key = self.storage_key(key);
        let raw = match self.store.get(&storage_key) {
            Ok(raw) => raw?,
            Err(error) => {
                log::warn!("annotation cache read failed for {storage_key}: {error}");
                return None;
            }
        };
        match serde_json::from_str::<CachedAnnotation>(&raw) {
            Ok(entry) if self.is_fresh(&entry) => Some(entry),
            Ok(_) => {
                log::debug!("annotation {storage_key} expired");
                self.discard(&storage_key);
                None
            }
            Err(error) => {
                log::debug!("annotation {storage_key} is malformed: {error}");
                self.discard(&storage_key);
                None
            }
        }
    }

    /// Store `text` for `key`, stamped with the current time.
    ///
    /// When the store reports its quota is exhausted the oldest half of the
    /// namespace is evicted and the write retried once.
    pub fn put(&mut self, key: &AnnotationKey, text: &str) -> CacheWrite {
        let entry = CachedAnnotation {
            record_id: key.record_id.clone(),
            provider: key.provider.clone(),
            text: text.to_owned(),
            created_at: self.clock.now_millis(),
            version: CACHE_VERSION.to_owned(),
        };
        let storage_key = self.storage_key(key);
        let value = match serde_json::to_string(&entry) {
            Ok(value) => value,
            Err(error) => {
                log::error!("failed to encode annotation {storage_key}: {error}");
                return CacheWrite::Dropped;
            }
        };

        match self.store.set(&storage_key, &value) {
            Ok(()) => CacheWrite::Stored,
            Err(StoreError::QuotaExceeded { .. }) => {
                let evicted = self.evict_oldest_half();
                log::info!("annotation cache full; evicted {evicted} entries");
                match self.store.set(&storage_key, &value) {
                    Ok(()) => CacheWrite::StoredAfterEviction { evicted },
                    Err(error) => {
                        log::error!("dropping annotation {storage_key} after eviction: {error}");
                        CacheWrite::Dropped
                    }
                }
            }
            Err(error) => {
                log::error!("dropping annotation {storage_key}: {error}");
                CacheWrite::Dropped
            }
        }
    }

    /// Remove the annotation for `key`, if any.
    pub fn remove(&mut self, key: &AnnotationKey) {
        let storage_key = self.storage_key(key);
        self.discard(&storage_key);
    }

    /// Every well-formed entry in the namespace, oldest first.
    pub fn list_all(&self) -> Vec<CachedAnnotation> {
        let mut entries: Vec<_> = self
            .namespace_keys()
            .into_iter()
            .filter_map(|storage_key| self.read_entry(&storage_key))
            .collect();
        entries.sort_by_key(|entry| entry.created_at);
        entries
    }

    /// Remove every expired or malformed entry, returning how many went.
    pub fn purge_expired(&mut self) -> usize {
        let stale: Vec<String> = self
            .namespace_keys()
            .into_iter()
            .filter(|storage_key| {
                self.read_entry(storage_key)
                    .is_none_or(|entry| !self.is_fresh(&entry))
            })
            .collect();
        for storage_key in &stale {
            self.discard(storage_key);
        }
        stale.len()
    }

    fn is_fresh(&self, entry: &CachedAnnotation) -> bool {
        let age = self.clock.now_millis().saturating_sub(entry.created_at);
        u128::from(age) < self.max_age.as_millis()
    }

    fn read_entry(&self, storage_key: &str) -> Option<CachedAnnotation> {
        let raw = self.store.get(storage_key).ok()??;
        serde_json::from_str(&raw).ok()
    }

    fn namespace_keys(&self) -> Vec<String> {
        self.store
            .keys_with_prefix(&self.prefix)
            .unwrap_or_else(|error| {
                log::warn!("annotation cache scan failed: {error}");
                Vec::new()
            })
    }

    fn discard(&mut self, storage_key: &str) {
        if let Err(error) = self.store.remove(storage_key) {
            log::warn!("failed to remove annotation {storage_key}: {error}");
        }
    }

    /// Malformed entries sort as the oldest.
    fn evict_oldest_half(&mut self) -> usize {
        let mut aged: Vec<(u64, String)> = self
            .namespace_keys()
            .into_iter()
            .map(|storage_key| {
                let created_at = self.read_entry(&storage_key).map_or(0, |e| e.created_at);
                (created_at, storage_key)
            })
            .collect();
        aged.sort();
        let count = aged.len().div_ceil(2);
        for (_, storage_key) in aged.iter().take(count) {
            self.discard(storage_key);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::FixedClock;
    use rstest::{fixture, rstest};

    const DAY_MS: u64 = 24 * 60 * 60 * 1000;
    const START: u64 = 1_700_000_000_000;

    #[fixture]
    fn clock() -> FixedClock {
        FixedClock::new(START)
    }

    #[fixture]
    fn key() -> AnnotationKey {
        AnnotationKey::new("osm_123", "gemini")
    }

    #[rstest]
    fn storage_key_embeds_version_record_and_provider(key: AnnotationKey, clock: FixedClock) {
        let cache = AnnotationCache::new(MemoryStore::new(), clock);
        assert_eq!(cache.storage_key(&key), "ai_desc_v1_osm_123_gemini");
    }

    #[rstest]
    #[case(29, true)]
    #[case(31, false)]
    fn entries_expire_after_thirty_days(
        key: AnnotationKey,
        clock: FixedClock,
        #[case] days: u64,
        #[case] hit: bool,
    ) {
        let mut cache = AnnotationCache::new(MemoryStore::new(), clock.clone());
        assert_eq!(cache.put(&key, "text"), CacheWrite::Stored);
        clock.advance(days * DAY_MS);
        assert_eq!(cache.get(&key).is_some(), hit);
        assert_eq!(cache.store().is_empty(), !hit);
    }

    #[rstest]
    fn malformed_entries_are_removed_on_read(key: AnnotationKey, clock: FixedClock) {
        let mut store = MemoryStore::new();
        store
            .set("ai_desc_v1_osm_123_gemini", "not json")
            .expect("seed entry");
        let mut cache = AnnotationCache::new(store, clock);
        assert_eq!(cache.get(&key), None);
        assert!(cache.store().is_empty());
    }

    #[rstest]
    fn quota_pressure_evicts_oldest_half(clock: FixedClock) {
        let mut cache = AnnotationCache::new(MemoryStore::new(), clock.clone());
        for index in 0..3 {
            cache.put(&AnnotationKey::new(format!("osm_{index}"), "gemini"), "text");
            clock.advance(1);
        }
        let used = cache.store().used_bytes();
        let mut cache = AnnotationCache::new(
            {
                let mut bounded = MemoryStore::with_quota(used + 10);
                for entry_key in cache.store().keys_with_prefix("").expect("keys") {
                    let value = cache.store().get(&entry_key).expect("get").expect("value");
                    bounded.set(&entry_key, &value).expect("copy");
                }
                bounded
            },
            clock,
        );

        let outcome = cache.put(&AnnotationKey::new("osm_9", "gemini"), "text");

        assert_eq!(outcome, CacheWrite::StoredAfterEviction { evicted: 2 });
        let remaining: Vec<_> = cache
            .list_all()
            .into_iter()
            .map(|entry| entry.record_id)
            .collect();
        assert_eq!(remaining, ["osm_2", "osm_9"]);
    }

    #[rstest]
    fn oversized_entry_is_dropped(key: AnnotationKey, clock: FixedClock) {
        let mut cache = AnnotationCache::new(MemoryStore::with_quota(16), clock);
        assert_eq!(cache.put(&key, "far too long to fit"), CacheWrite::Dropped);
        assert_eq!(cache.get(&key), None);
    }

    #[rstest]
    fn list_all_skips_malformed_and_foreign_keys(clock: FixedClock) {
        let mut store = MemoryStore::new();
        store.set("ai_desc_v1_broken", "{").expect("seed");
        store.set("unrelated", "{}").expect("seed");
        let mut cache = AnnotationCache::new(store, clock);
        cache.put(&AnnotationKey::new("wikidata_Q1", "gemini"), "text");
        let listed = cache.list_all();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].record_id, "wikidata_Q1");
    }

    #[rstest]
    fn purge_removes_expired_and_malformed(clock: FixedClock) {
        let mut store = MemoryStore::new();
        store.set("ai_desc_v1_broken", "{").expect("seed");
        let mut cache = AnnotationCache::new(store, clock.clone());
        cache.put(&AnnotationKey::new("osm_1", "gemini"), "old");
        clock.advance(31 * DAY_MS);
        cache.put(&AnnotationKey::new("osm_2", "gemini"), "new");

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.list_all().len(), 1);
    }
}
