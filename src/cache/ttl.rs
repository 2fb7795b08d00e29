//! Bounded, time-limited memoization of one remote operation.
//!
//! A `TtlCache` owns the results of a single remote call site. Entries expire `ttl` after their
//! fetch started and the oldest insertion is evicted once `max_entries` is reached. Reads never
//! refresh an entry's position, so eviction order is insertion order.
//!
//! Concurrent callers asking for the same missing key share one in-flight request: the first
//! caller registers a shared future under the key and everyone else awaits a clone of it. The
//! shared future itself records the outcome in the cache, so the bookkeeping survives callers
//! being dropped midway. A request left unpolled by a departed caller therefore ages while it
//! waits.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lru::LruCache;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Freshness and capacity settings for one cached operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long an inserted value is served.
    pub ttl: Duration,
    /// Maximum number of values kept at once.
    pub max_entries: NonZeroUsize,
}

impl CachePolicy {
    pub const DEFAULT_MAX_ENTRIES: NonZeroUsize = match NonZeroUsize::new(100) {
        Some(max) => max,
        None => unreachable!(),
    };

    pub fn new(ttl: Duration, max_entries: NonZeroUsize) -> Self {
        Self { ttl, max_entries }
    }

    pub fn seconds(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs), Self::DEFAULT_MAX_ENTRIES)
    }

    pub fn minutes(mins: u64) -> Self {
        Self::seconds(mins * 60)
    }

    pub fn with_max_entries(mut self, max_entries: NonZeroUsize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

/// Counters describing cache behaviour so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub evictions: u64,
    pub entries: usize,
}

type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct CacheEntry<V> {
    value: V,
    /// When the fetch that produced `value` started
    fetched_at: Instant,
}

struct CacheState<K: Hash + Eq, V, E> {
    entries: LruCache<K, CacheEntry<V>>,
    in_flight: HashMap<K, SharedFetch<V, E>>,
    stats: CacheStats,
}

/// Memoizes `K -> Result<V, E>` calls. Failures are delivered to every waiting caller but
/// never stored.
pub struct TtlCache<K: Hash + Eq, V, E> {
    name: &'static str,
    policy: CachePolicy,
    state: Arc<Mutex<CacheState<K, V, E>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K, V, E> TtlCache<K, V, E>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, policy: CachePolicy) -> Self {
        Self {
            name,
            policy,
            state: Arc::new(Mutex::new(CacheState {
                entries: LruCache::new(policy.max_entries),
                in_flight: HashMap::new(),
                stats: CacheStats::default(),
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Return the cached value for `key` if it is still fresh, otherwise run `fetch` (or join
    /// the request already running for `key`) and cache its successful result.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let pending = {
            let mut state = lock(&self.state);
            let now = Instant::now();
            let ttl = self.policy.ttl;

            let cached = state.entries.peek(&key).map(|entry| {
                (now.duration_since(entry.fetched_at) <= ttl).then(|| entry.value.clone())
            });
            match cached {
                Some(Some(value)) => {
                    state.stats.hits += 1;
                    return Ok(value);
                }
                Some(None) => {
                    debug!(cache = self.name, "Entry expired");
                    state.entries.pop(&key);
                }
                None => {}
            }

            if let Some(pending) = state.in_flight.get(&key).cloned() {
                state.stats.coalesced += 1;
                pending
            } else {
                state.stats.misses += 1;
                let pending = self.register(key.clone(), fetch());
                state.in_flight.insert(key, pending.clone());
                pending
            }
        };

        pending.await
    }

    /// Wrap `fetch` so that completing it records the outcome under `key`.
    fn register<Fut>(&self, key: K, fetch: Fut) -> SharedFetch<V, E>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let state: Weak<Mutex<CacheState<K, V, E>>> = Arc::downgrade(&self.state);
        let name = self.name;
        let started_at = Instant::now();

        async move {
            let result = fetch.await;
            if let Some(state) = state.upgrade() {
                let mut state = lock(&state);
                state.in_flight.remove(&key);
                if let Ok(value) = &result {
                    let entry = CacheEntry {
                        value: value.clone(),
                        fetched_at: started_at,
                    };
                    if let Some((evicted, _)) = state.entries.push(key.clone(), entry) {
                        if evicted != key {
                            state.stats.evictions += 1;
                            debug!(cache = name, "Evicted oldest entry");
                        }
                    }
                }
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Drop every cached value. Requests already in flight are unaffected.
    pub fn clear(&self) {
        lock(&self.state).entries.clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = lock(&self.state);
        CacheStats {
            entries: state.entries.len(),
            ..state.stats
        }
    }
}

/// Cache key for an argument list whose order carries no meaning.
pub fn unordered_key<T: Ord + Clone>(items: &[T]) -> Vec<T> {
    let mut key = items.to_vec();
    key.sort();
    key
}
