//! TTL cache for aggregation results.
//!
//! Entries hold the value together with the instant it was stored, under one
//! lock, so a reader never sees a value paired with someone else's timestamp.
//! Expiry is lazy: a stale entry is dropped on the read that finds it.
//!
//! Concurrent misses on the same key may both run their loader; the last
//! store wins. Loader errors are returned to the caller and never cached.
//! A load that was in flight while the cache was invalidated is returned to
//! its caller but not stored.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::metrics;
use crate::registry::AuthObserver;

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

struct CacheState<V> {
    entries: LruCache<String, CacheEntry<V>>,
    /// Bumped by every invalidation.
    generation: u64,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    invalidations: AtomicU64,
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped because their TTL had passed
    pub expired: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub invalidations: u64,
}

impl CacheStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// LRU-bounded cache whose entries expire after a per-lookup TTL.
pub struct AggregationCache<V> {
    state: RwLock<CacheState<V>>,
    counters: CacheCounters,
    /// Prefix of the emitted `<name>_cache_hits_total` / `_misses_total` counters.
    metric_name: Option<&'static str>,
}

impl<V: Clone + Send + Sync> AggregationCache<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: RwLock::new(CacheState {
                entries: LruCache::new(capacity),
                generation: 0,
            }),
            counters: CacheCounters::default(),
            metric_name: None,
        }
    }

    pub fn with_metrics(mut self, name: &'static str) -> Self {
        self.metric_name = Some(name);
        self
    }

    /// Value stored under `key` if it is younger than `ttl`.
    pub async fn get(&self, key: &str, ttl: Duration) -> Option<V> {
        let mut state = self.state.write().await;

        let lookup = state
            .entries
            .get(key)
            .map(|entry| entry.is_fresh(ttl).then(|| entry.value.clone()));
        let fresh = match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                state.entries.pop(key);
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => None,
        };

        match &fresh {
            Some(_) => self.counters.hits.fetch_add(1, Ordering::Relaxed),
            None => self.counters.misses.fetch_add(1, Ordering::Relaxed),
        };
        if let Some(name) = self.metric_name {
            metrics::record_cache_lookup(name, fresh.is_some());
        }
        fresh
    }

    pub async fn insert(&self, key: &str, value: V) {
        self.state.write().await.entries.put(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Cached value if fresh, else the loader's result, stored with a new timestamp.
    pub async fn get_or_load<F, Fut, E>(&self, key: &str, ttl: Duration, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key, ttl).await {
            return Ok(value);
        }

        let generation = self.state.read().await.generation;
        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        match loader().await {
            Ok(value) => {
                let mut state = self.state.write().await;
                if state.generation == generation {
                    state.entries.put(
                        key.to_string(),
                        CacheEntry {
                            value: value.clone(),
                            stored_at: Instant::now(),
                        },
                    );
                } else {
                    debug!(key = %key, "Cache invalidated during load, result not stored");
                }
                Ok(value)
            }
            Err(e) => {
                self.counters.load_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub async fn invalidate(&self, key: &str) {
        let mut state = self.state.write().await;
        state.generation += 1;
        if state.entries.pop(key).is_some() {
            self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn invalidate_all(&self) {
        let mut state = self.state.write().await;
        state.generation += 1;
        let dropped = state.entries.len() as u64;
        state.entries.clear();
        self.counters.invalidations.fetch_add(dropped, Ordering::Relaxed);
        debug!(dropped = dropped, "Cache cleared");
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            load_failures: self.counters.load_failures.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl<V: Clone + Send + Sync> AuthObserver for AggregationCache<V> {
    async fn auth_changed(&self, connector_id: &str, authenticated: bool) {
        debug!(connector = %connector_id, authenticated = authenticated, "Auth changed, clearing cache");
        self.invalidate_all().await;
    }
}
