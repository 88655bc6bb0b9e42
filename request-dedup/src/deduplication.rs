use crate::{config::DeduplicationConfig, key::RequestKey};
use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// The single in-flight computation every caller with the same key awaits.
pub type SharedResponse<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Represents a pending request
pub struct PendingRequest<T, E> {
    /// Registration id, so a late settle cannot remove a newer registration
    pub id: u64,
    pub started_at: Instant,
    pub future: SharedResponse<T, E>,
}

/// Outcome of [`PendingRequests::join_or_start`].
pub enum Claim<T, E> {
    /// No request was in flight; the caller registered this one.
    Started { id: u64, future: SharedResponse<T, E> },
    /// An identical request was already in flight.
    Joined(SharedResponse<T, E>),
}

/// Registry of in-flight requests.
///
/// When multiple identical requests come in, only the first one is executed
/// and its result is shared with every caller that arrives before it settles.
pub struct PendingRequests<T, E> {
    pending: DashMap<RequestKey, PendingRequest<T, E>>,
    next_id: AtomicU64,
    coalesced: AtomicU64,
    pub config: DeduplicationConfig,
}

impl<T, E> PendingRequests<T, E>
where
    T: Clone,
    E: Clone,
{
    pub fn new(config: DeduplicationConfig) -> Self {
        Self {
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
            coalesced: AtomicU64::new(0),
            config,
        }
    }

    /// Return the in-flight request for `key`, or register the one built by `start`.
    ///
    /// Check and registration happen under the map's entry lock, so two
    /// racing callers can never both start a request. `start` runs while that
    /// lock is held: it should only build a lazy future and must not touch
    /// this registry.
    pub fn join_or_start<F>(&self, key: &RequestKey, start: F) -> Claim<T, E>
    where
        F: FnOnce(u64) -> SharedResponse<T, E>,
    {
        match self.pending.entry(key.clone()) {
            Entry::Occupied(entry) => {
                log::debug!(
                    "Request already pending for {} {}",
                    key.method(),
                    key.base_url()
                );
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                Claim::Joined(entry.get().future.clone())
            }
            Entry::Vacant(entry) => {
                log::debug!(
                    "Executing new request for {} {}",
                    key.method(),
                    key.base_url()
                );
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let future = start(id);
                entry.insert(PendingRequest {
                    id,
                    started_at: Instant::now(),
                    future: future.clone(),
                });
                Claim::Started { id, future }
            }
        }
    }

    /// Run `f` only while registration `id` is still the tracked one for `key`.
    ///
    /// The registration stays locked for the duration of `f`, so a concurrent
    /// [`clear`](Self::clear) is ordered either entirely before or after it.
    pub fn if_tracked<F: FnOnce()>(&self, key: &RequestKey, id: u64, f: F) -> bool {
        match self.pending.get(key) {
            Some(pending) if pending.id == id => {
                f();
                true
            }
            _ => false,
        }
    }

    /// Drop registration `id` for `key`. Returns whether it was still tracked.
    pub fn finish(&self, key: &RequestKey, id: u64) -> bool {
        self.pending
            .remove_if(key, |_, pending| pending.id == id)
            .is_some()
    }

    /// Stop tracking requests pending longer than the configured timeout.
    ///
    /// The underlying calls keep running; only new callers stop joining them.
    pub fn evict_stale(&self) -> usize {
        let timeout = self.config.request_timeout();
        let now = Instant::now();
        let before = self.pending.len();

        self.pending.retain(|key, pending| {
            let stale = now.saturating_duration_since(pending.started_at) > timeout;
            if stale {
                log::warn!(
                    "Dropping request pending for over {:?}: {} {}",
                    timeout,
                    key.method(),
                    key.base_url()
                );
            }
            !stale
        });

        before.saturating_sub(self.pending.len())
    }

    /// Get statistics about pending requests
    pub fn stats(&self) -> DeduplicationStats {
        DeduplicationStats {
            pending_requests: self.pending.len(),
            coalesced_requests: self.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Clear all pending requests
    pub fn clear(&self) {
        self.pending.clear();
        log::info!("Pending requests cleared");
    }
}

/// Statistics for request deduplication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeduplicationStats {
    pub pending_requests: usize,
    /// Calls served by joining an already in-flight request
    pub coalesced_requests: u64,
}

/// Thread-safe wrapper for the registry
pub type SharedPendingRequests<T, E> = Arc<PendingRequests<T, E>>;
