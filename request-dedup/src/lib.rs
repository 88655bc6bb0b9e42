//! In-process request deduplication and short-lived response caching.
//!
//! A [`RequestDeduplicator`] wraps caller-supplied request functions. Identical
//! requests issued while one is in flight share that single call, and
//! successful reads are served from memory for a short TTL.

pub mod cache;
pub mod config;
pub mod deduplication;
mod error;
mod key;
mod method;
mod request;


use cache::{ResponseCache, SharedResponseCache};
use deduplication::{Claim, PendingRequests, SharedPendingRequests};
use futures::{Future, FutureExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub use cache::{CacheStats, CachedResult};
pub use config::{CacheConfig, Config, DeduplicationConfig};
pub use deduplication::DeduplicationStats;
pub use error::{Error, KeyError};
pub use key::RequestKey;
pub use method::Method;
pub use request::{ExecuteOptions, RequestInfo};

struct Inner<T, E> {
    cache: SharedResponseCache<T>,
    pending: SharedPendingRequests<T, E>,
    calls: AtomicU64,
    sweep_every: u64,
}

/// Deduplicating, caching front for request functions.
///
/// Cloning is cheap and clones share state; build one per logical domain
/// and hand clones to whatever needs it. Errors produced by request
/// functions are handed back unchanged, so both `T` and `E` must be `Clone`
/// (wrap non-`Clone` errors in an `Arc`).
pub struct RequestDeduplicator<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for RequestDeduplicator<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Default for RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<T, E> RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache: Arc::new(ResponseCache::new(config.cache)),
                pending: Arc::new(PendingRequests::new(config.deduplication)),
                calls: AtomicU64::new(0),
                sweep_every: config.sweep_every,
            }),
        }
    }

    /// Execute `request_fn` with caching and deduplication.
    ///
    /// Cacheable reads are served from the cache while fresh. Otherwise, if an
    /// identical request is already in flight its outcome is shared; if not,
    /// `request_fn` is invoked and runs to completion on a spawned task even
    /// if every caller stops waiting. Requests whose key cannot be derived
    /// are executed directly.
    ///
    /// `request_fn` is never called while internal locks are held, so it may
    /// itself call back into this deduplicator.
    pub async fn execute<F, Fut>(
        &self,
        request_fn: F,
        request: &RequestInfo,
        options: ExecuteOptions,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.maybe_sweep();

        let key = match request.key() {
            Ok(key) => key,
            Err(e) => {
                log::warn!("Bypassing cache for {} {}: {}", request.method(), request.url(), e);
                return request_fn().await;
            }
        };

        let cache_ttl = (key.method().is_cacheable() && !options.skip_cache)
            .then(|| options.ttl.unwrap_or_else(|| self.inner.cache.config.default_ttl()));

        if cache_ttl.is_some() {
            if let Some(data) = self.inner.cache.get(&key) {
                return Ok(data);
            }
        }

        if !self.inner.pending.config.enabled {
            let result = request_fn().await;
            if let (Ok(data), Some(ttl)) = (&result, cache_ttl) {
                self.inner.cache.put(key, data.clone(), ttl);
            }
            return result;
        }

        // `request_fn` is first called when the shared future is polled, after
        // the registry lock is released, so it may use this deduplicator freely.
        let claim = self.inner.pending.join_or_start(&key, |id| {
            let inner = Arc::clone(&self.inner);
            let key = key.clone();
            async move {
                let result = request_fn().await;
                inner.settle(&key, id, cache_ttl, &result);
                result
            }
            .boxed()
            .shared()
        });

        match claim {
            Claim::Joined(shared) => shared.await,
            Claim::Started { future, .. } => {
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(future.clone());
                    }
                    Err(_) => log::debug!("No tokio runtime, request runs only while awaited"),
                }
                future.await
            }
        }
    }

    /// Drop every cached response and stop tracking every in-flight request.
    pub fn clear_cache(&self) {
        // Pending first: a settle that already passed its tracking check is
        // then guaranteed to land before the cache is emptied.
        self.inner.pending.clear();
        self.inner.cache.clear();
    }

    /// Drop cached responses whose base URL contains `pattern`.
    pub fn clear_cache_pattern(&self, pattern: &str) -> usize {
        self.inner.cache.clear_pattern(pattern)
    }

    /// Evict expired cache entries and stale pending requests.
    pub fn sweep(&self) {
        self.inner.sweep();
    }

    /// Sweep on a fixed interval until the returned task is aborted or every
    /// handle to this deduplicator is dropped. Must be called inside a tokio runtime.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                match inner.upgrade() {
                    Some(inner) => inner.sweep(),
                    None => break,
                }
            }
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    pub fn dedup_stats(&self) -> DeduplicationStats {
        self.inner.pending.stats()
    }

    fn maybe_sweep(&self) {
        let sweep_every = self.inner.sweep_every;
        if sweep_every == 0 {
            return;
        }
        let calls = self.inner.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if calls % sweep_every == 0 {
            self.inner.sweep();
        }
    }
}

impl<T, E> Inner<T, E>
where
    T: Clone,
    E: Clone,
{
    fn settle(&self, key: &RequestKey, id: u64, cache_ttl: Option<Duration>, result: &Result<T, E>) {
        match (result, cache_ttl) {
            (Ok(data), Some(ttl)) => {
                let stored = self
                    .pending
                    .if_tracked(key, id, || self.cache.put(key.clone(), data.clone(), ttl));
                if !stored {
                    log::debug!(
                        "Discarding late result for {} {}",
                        key.method(),
                        key.base_url()
                    );
                }
            }
            (Err(_), _) => log::debug!("Request failed for {} {}", key.method(), key.base_url()),
            (Ok(_), None) => {}
        }
        self.pending.finish(key, id);
    }

    fn sweep(&self) {
        let expired = self.cache.evict_expired();
        let stale = self.pending.evict_stale();
        if expired + stale > 0 {
            log::debug!(
                "Sweep removed {} expired cache entries and {} stale pending requests",
                expired,
                stale
            );
        }
    }
}
