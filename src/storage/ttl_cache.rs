use std::collections::HashMap as StdHashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{AppError, AppResult};

type Population<T> = Shared<BoxFuture<'static, AppResult<Arc<T>>>>;

struct Entry<T> {
    value: Arc<T>,
    inserted_at: Instant,
    ttl: Duration,
}

impl<T> Entry<T> {
    fn is_fresh(&self, now: Instant) -> bool { now.saturating_duration_since(self.inserted_at) < self.ttl }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// A named in-memory map whose entries expire a fixed time after insertion.
///
/// Expiry is lazy: a stale entry is removed by the access that finds it. `sweep`
/// exists for callers that want to bound memory between accesses. Values are held
/// behind `Arc` so readers never copy a cached listing.
///
/// `get_or_try_insert_with` collapses concurrent misses on one key into a single
/// population. The population runs as its own task, so a waiter that is dropped
/// does not cancel it; a failed population is handed to every waiter and then
/// forgotten.
pub struct TtlCache<T> {
    name: &'static str,
    default_ttl: Duration,
    map: Arc<parking_lot::RwLock<StdHashMap<String, Entry<T>>>>,
    // Lock order: inflight before map. The population task never holds both.
    inflight: Arc<parking_lot::Mutex<StdHashMap<String, Population<T>>>>,
    counters: Arc<Counters>,
}

impl<T> Clone for TtlCache<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            default_ttl: self.default_ttl,
            map: self.map.clone(),
            inflight: self.inflight.clone(),
            counters: self.counters.clone(),
        }
    }
}

impl<T> TtlCache<T> {
    pub fn new(name: &'static str, default_ttl: Duration) -> Self {
        Self {
            name,
            default_ttl,
            map: Arc::new(parking_lot::RwLock::new(StdHashMap::new())),
            inflight: Arc::new(parking_lot::Mutex::new(StdHashMap::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn name(&self) -> &'static str { self.name }
    pub fn default_ttl(&self) -> Duration { self.default_ttl }

    /// Fresh value for `key`, or None. A stale entry is evicted before returning.
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        match self.lookup(key) {
            Some(v) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(target: "habgate::cache", cache = self.name, key, "cache hit");
                Some(v)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(target: "habgate::cache", cache = self.name, key, "cache miss");
                None
            }
        }
    }

    fn lookup(&self, key: &str) -> Option<Arc<T>> {
        let now = Instant::now();
        {
            let r = self.map.read();
            match r.get(key) {
                None => return None,
                Some(ent) if ent.is_fresh(now) => return Some(ent.value.clone()),
                Some(_) => {}
            }
        }
        // Stale: re-check under the write lock, a concurrent put may have refreshed it.
        let mut w = self.map.write();
        match w.get(key) {
            Some(ent) if ent.is_fresh(now) => Some(ent.value.clone()),
            Some(_) => {
                w.remove(key);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                crate::tprintln!("{} cache evicted stale key {}", self.name, key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: impl Into<String>, value: T, ttl: Option<Duration>) -> Arc<T> {
        let value = Arc::new(value);
        self.put_arc(key.into(), value.clone(), ttl.unwrap_or(self.default_ttl));
        value
    }

    fn put_arc(&self, key: String, value: Arc<T>, ttl: Duration) {
        self.map.write().insert(key, Entry { value, inserted_at: Instant::now(), ttl });
    }

    pub fn invalidate(&self, key: &str) -> bool { self.map.write().remove(key).is_some() }

    pub fn clear(&self) { self.map.write().clear(); }

    pub fn len(&self) -> usize { self.map.read().len() }

    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }

    /// Remove every stale entry. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut w = self.map.write();
        let before = w.len();
        w.retain(|_, ent| ent.is_fresh(now));
        let removed = before - w.len();
        if removed > 0 {
            self.counters.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            crate::tprintln!("{} cache swept {} entries", self.name, removed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl<T: Send + Sync + 'static> TtlCache<T> {
    /// Return the cached value for `key` or populate it with `populate`.
    ///
    /// Concurrent callers missing on the same key share one call to `populate`.
    /// Only a successful result is stored (with `ttl`, or the default TTL).
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: &str, ttl: Option<Duration>, populate: F) -> AppResult<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        let population = {
            let mut inflight = self.inflight.lock();
            if let Some(v) = self.lookup(key) {
                // Populated between our miss and taking the lock.
                return Ok(v);
            }
            match inflight.get(key) {
                Some(p) => {
                    debug!(target: "habgate::cache", cache = self.name, key, "joining in-flight population");
                    p.clone()
                }
                None => {
                    let p = self.spawn_population(key.to_string(), ttl.unwrap_or(self.default_ttl), populate());
                    inflight.insert(key.to_string(), p.clone());
                    p
                }
            }
        };
        population.await
    }

    fn spawn_population<Fut>(&self, key: String, ttl: Duration, fut: Fut) -> Population<T>
    where
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let _guard = InflightGuard { inflight: this.inflight.clone(), key: key.clone() };
            let value = Arc::new(fut.await?);
            this.put_arc(key, value.clone(), ttl);
            Ok(value)
        });
        async move {
            match handle.await {
                Ok(res) => res,
                Err(e) => Err(AppError::internal("cache_population_failed".to_string(), e.to_string())),
            }
        }
        .boxed()
        .shared()
    }
}

/// Clears the in-flight slot when the population task ends, however it ends.
struct InflightGuard<T> {
    inflight: Arc<parking_lot::Mutex<StdHashMap<String, Population<T>>>>,
    key: String,
}

impl<T> Drop for InflightGuard<T> {
    fn drop(&mut self) { self.inflight.lock().remove(&self.key); }
}

#[cfg(test)]
#[path = "ttl_cache_tests.rs"]
mod ttl_cache_tests;
