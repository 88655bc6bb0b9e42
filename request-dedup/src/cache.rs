use crate::{config::CacheConfig, key::RequestKey};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Cached response with metadata
#[derive(Clone, Debug)]
pub struct CachedResult<T> {
    pub data: T,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl<T> CachedResult<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// Check if the cached result is still valid
    pub fn is_valid(&self) -> bool {
        self.age() < self.ttl
    }

    /// Check if the cached result will expire soon (within 10% of TTL)
    pub fn expires_soon(&self) -> bool {
        self.ttl.saturating_sub(self.age()) < self.ttl / 10
    }

    // Measured from the store time so that huge TTLs never overflow an `Instant`.
    fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.stored_at)
    }
}

/// In-memory response cache keyed by [`RequestKey`], safe to share between tasks.
///
/// The cache is payload-agnostic: it stores whatever `T` the owning
/// deduplicator produces.
pub struct ResponseCache<T> {
    cache: DashMap<RequestKey, CachedResult<T>>,
    pub config: CacheConfig,
}

impl<T: Clone> ResponseCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: DashMap::new(),
            config,
        }
    }

    /// Get cached data if available and valid
    pub fn get(&self, key: &RequestKey) -> Option<T> {
        if !self.config.enabled {
            return None;
        }

        if let Some(cached) = self.cache.get(key) {
            if cached.is_valid() {
                log::debug!("Cache hit for {} {}", key.method(), key.base_url());
                return Some(cached.data.clone());
            }
        }

        // Only drop the entry if it is still expired; a fresh store may have raced us.
        if self
            .cache
            .remove_if(key, |_, cached| !cached.is_valid())
            .is_some()
        {
            log::debug!("Cache expired for {} {}", key.method(), key.base_url());
        }

        log::debug!("Cache miss for {} {}", key.method(), key.base_url());
        None
    }

    /// Store data in the cache
    pub fn put(&self, key: RequestKey, data: T, ttl: Duration) {
        if !self.config.enabled || self.config.max_entries == 0 {
            return;
        }

        if !self.cache.contains_key(&key) && self.cache.len() >= self.config.max_entries {
            self.evict_expired();

            if self.cache.len() >= self.config.max_entries {
                self.evict_oldest();
            }
        }

        log::debug!(
            "Stored {} {} in cache for {:?}",
            key.method(),
            key.base_url(),
            ttl
        );
        self.cache.insert(key, CachedResult::new(data, ttl));
    }

    /// Remove expired entries from the cache, returning how many were removed
    pub fn evict_expired(&self) -> usize {
        let before = self.cache.len();
        self.cache.retain(|_, cached| cached.is_valid());
        let evicted = before.saturating_sub(self.cache.len());

        if evicted > 0 {
            log::debug!("Evicted {} expired cache entries", evicted);
        }
        evicted
    }

    /// Remove the oldest quarter of entries when at capacity
    fn evict_oldest(&self) {
        let mut entries: Vec<_> = self
            .cache
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stored_at))
            .collect();

        entries.sort_by_key(|(_, stored_at)| *stored_at);

        let to_remove = (self.config.max_entries / 4).max(1);
        for (key, _) in entries.into_iter().take(to_remove) {
            self.cache.remove(&key);
        }

        log::debug!("Evicted {} oldest cache entries", to_remove);
    }

    /// Remove entries whose base URL contains `pattern`, returning how many were removed
    pub fn clear_pattern(&self, pattern: &str) -> usize {
        let before = self.cache.len();
        self.cache.retain(|key, _| !key.base_url().contains(pattern));
        let removed = before.saturating_sub(self.cache.len());

        log::info!("Cleared {} cache entries matching {:?}", removed, pattern);
        removed
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        self.cache.clear();
        log::info!("Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let total_entries = self.cache.len();
        let (expired_entries, expiring_entries) =
            self.cache
                .iter()
                .fold((0, 0), |(expired, expiring), entry| {
                    let cached = entry.value();
                    if !cached.is_valid() {
                        (expired + 1, expiring)
                    } else if cached.expires_soon() {
                        (expired, expiring + 1)
                    } else {
                        (expired, expiring)
                    }
                });

        CacheStats {
            total_entries,
            valid_entries: total_entries.saturating_sub(expired_entries),
            expired_entries,
            expiring_entries,
            max_entries: self.config.max_entries,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    /// Valid entries within the last 10% of their TTL
    pub expiring_entries: usize,
    pub max_entries: usize,
}

/// Thread-safe wrapper for the cache
pub type SharedResponseCache<T> = Arc<ResponseCache<T>>;
