//! Loading Cache Module
//!
//! The aggregate cache: memoizing `get` with per-key single-flight loads,
//! TTL expiry, and approximate LRU eviction.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::cache::{
    CacheEntry, CacheStats, Claim, EntryStore, FlightGuard, FlightTable, LruTracker, StatsRecorder,
};
use crate::config::CacheConfig;
use crate::error::ConfigError;

/// Boxed value-producing function invoked on cache misses.
pub type Loader<K, V, E> = Box<dyn Fn(&K) -> Result<V, E> + Send + Sync>;

// == Loading Cache ==
/// A concurrent memoizing cache.
///
/// `get` returns the cached value for a key, or runs the configured loader
/// exactly once per genuine miss to produce it. Loaded values stay fresh
/// for the configured TTL and the store is bounded to `max_size` entries by
/// approximate-LRU eviction.
///
/// Concurrency contract:
/// - Reads of fresh entries are lock-free and never block, regardless of
///   what other callers are doing.
/// - Misses are coordinated per key: the first caller to miss becomes the
///   key's load owner, every other concurrent caller for that key blocks
///   until the owner's load resolves, and callers of *different* keys
///   proceed in parallel. The loader runs without any cache-wide lock, so
///   a slow loader stalls only its own key.
/// - A value published by one thread is visible to every later read from
///   any thread without further locking.
///
/// Expiry is lazy: expired entries count toward [`len`](Self::len) until
/// they are overwritten, evicted, or explicitly purged, but are treated as
/// absent by every read.
///
/// Loader errors are returned to the caller unchanged and never cached;
/// the next `get` for the key retries from scratch.
pub struct LoadingCache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Authoritative key-to-entry map (lock-free read side)
    store: EntryStore<K, V>,
    /// Access recency stamps consulted by eviction
    lru: LruTracker<K>,
    /// Per-key in-flight load coordination
    flights: FlightTable<K>,
    /// Performance counters
    stats: StatsRecorder,
    /// Serializes eviction passes; never held while the loader runs
    evict_lock: Mutex<()>,
    config: CacheConfig,
    loader: Loader<K, V, E>,
}

impl<K, V, E> LoadingCache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a cache holding at most `max_size` entries, each fresh for
    /// `ttl` after its load.
    ///
    /// # Arguments
    /// * `max_size` - Capacity bound, at least 1
    /// * `ttl` - Freshness window applied to every loaded value
    /// * `loader` - Value producer run on misses; its error type is
    ///   surfaced through [`get`](Self::get) unchanged
    pub fn new<F>(max_size: usize, ttl: Duration, loader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        Self::with_config(CacheConfig::new(max_size, ttl), loader)
    }

    /// Creates a cache from a prebuilt [`CacheConfig`].
    pub fn with_config<F>(config: CacheConfig, loader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        config.validate()?;
        Ok(Self {
            store: EntryStore::new(),
            lru: LruTracker::new(),
            flights: FlightTable::new(),
            stats: StatsRecorder::new(),
            evict_lock: Mutex::new(()),
            config,
            loader: Box::new(loader),
        })
    }

    /// Starts a [`CacheBuilder`] with default bounds.
    pub fn builder() -> CacheBuilder<K, V, E> {
        CacheBuilder::new()
    }

    // == Get ==
    /// Returns the value for `key`, loading it if no fresh one is cached.
    ///
    /// Blocks only when the key is missing or expired: either this caller
    /// wins the key's flight and runs the loader, or it waits for the
    /// current owner and re-reads the published result. Woken waiters that
    /// still find no fresh entry (owner failed, value already expired or
    /// evicted) claim the next flight themselves, so no caller returns
    /// without a definitive outcome for its own attempt.
    ///
    /// # Returns
    /// - `Ok(value)` - the cached or freshly loaded value
    /// - `Err(e)` - this caller ran the loader and it failed; the error is
    ///   propagated unchanged and nothing was cached
    pub fn get(&self, key: &K) -> Result<V, E> {
        // Fast path: lock-free hit check
        if let Some(value) = self.lookup_fresh(key) {
            self.stats.record_hit();
            return Ok(value);
        }
        self.stats.record_miss();

        // Slow path: coordinate with other callers missing on this key
        loop {
            match self.flights.claim(key) {
                Claim::Owner(guard) => {
                    // Re-check: another owner may have published a fresh
                    // entry between this caller's miss and its claim
                    if let Some(value) = self.lookup_fresh(key) {
                        guard.complete();
                        return Ok(value);
                    }
                    return self.load(key, guard);
                }
                Claim::Joined(flight) => {
                    trace!("waiting on in-flight load");
                    let outcome = flight.wait();
                    trace!(?outcome, "in-flight load resolved");
                    if let Some(value) = self.lookup_fresh(key) {
                        return Ok(value);
                    }
                }
            }
        }
    }

    /// Lock-free read of a fresh entry, refreshing its recency on success.
    fn lookup_fresh(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let entry = self.store.lookup(key)?;
        if entry.is_expired(now) {
            return None;
        }
        self.lru.touch(key);
        trace!(
            remaining_ms = entry.time_remaining(now).as_millis() as u64,
            "serving cached value"
        );
        Some(entry.value)
    }

    /// Runs the loader as the key's flight owner, publishing on success.
    ///
    /// The guard resolves the flight on every exit path, including a
    /// loader panic, so waiters are never stranded.
    fn load(&self, key: &K, guard: FlightGuard<'_, K>) -> Result<V, E> {
        let started = Instant::now();
        match (self.loader)(key) {
            Ok(value) => {
                self.stats.record_load();
                self.store
                    .publish(key.clone(), CacheEntry::new(value.clone(), self.config.ttl));
                self.lru.touch(key);
                self.evict_to_capacity();
                guard.complete();
                debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    entries = self.store.len(),
                    "loaded value"
                );
                Ok(value)
            }
            Err(err) => {
                self.stats.record_load_failure();
                guard.fail();
                debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "load failed"
                );
                Err(err)
            }
        }
    }

    // == Eviction ==
    /// Trims the store back to `max_size`, least recently used keys first.
    ///
    /// Passes are serialized by the eviction mutex. The loop ends
    /// defensively if the tracker runs dry while the store still reads
    /// over capacity: the size bound is eventual, not a hard invariant,
    /// and the next publish resumes trimming.
    fn evict_to_capacity(&self) {
        let _guard = self
            .evict_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while self.store.len() > self.config.max_size {
            match self.lru.evict_oldest() {
                Some(key) => {
                    if self.store.remove(&key).is_some() {
                        self.stats.record_eviction();
                        trace!(entries = self.store.len(), "evicted oldest entry");
                    }
                }
                None => break,
            }
        }
    }

    // == Length ==
    /// Current physical entry count, expired-but-unevicted entries
    /// included.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // == Get All ==
    /// Snapshot of every entry still fresh at the time of the call.
    ///
    /// Best-effort under concurrent mutation: entries published during the
    /// scan may be missing, but an expired entry never appears.
    pub fn get_all(&self) -> HashMap<K, V> {
        self.store.snapshot(Instant::now())
    }

    // == Invalidate ==
    /// Drops `key`'s entry so the next `get` reloads it.
    ///
    /// Returns whether an entry was present. An in-flight load for the key
    /// is not cancelled; if one is running it will still publish when it
    /// lands.
    pub fn invalidate(&self, key: &K) -> bool {
        self.lru.remove(key);
        self.store.remove(key).is_some()
    }

    // == Clear ==
    /// Drops every entry and recency stamp.
    pub fn clear(&self) {
        self.lru.clear();
        self.store.clear();
    }

    // == Purge Expired ==
    /// Eagerly removes entries whose TTL has lapsed.
    ///
    /// Lazy expiry normally leaves stale entries in place until overwrite
    /// or eviction; this sweeps them (and their recency stamps) out in one
    /// pass. An entry reloaded fresh between the scan and its removal is
    /// left alone. A reload landing between an entry's removal and its
    /// stamp cleanup can leave the fresh entry unstamped until its next
    /// hit re-stamps it; eviction cannot select the key during that
    /// window. Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for key in self.store.expired_keys(now) {
            if self.store.remove_if_expired(&key, now) {
                self.lru.remove(&key);
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, entries = self.store.len(), "purged expired entries");
        }
        removed
    }

    // == Stats ==
    /// Point-in-time performance counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.store.len(), self.config.max_size)
    }

    // == Accessors ==
    /// Configured capacity bound.
    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    /// Configured freshness window.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }
}

impl<K, V, E> fmt::Debug for LoadingCache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingCache")
            .field("entries", &self.store.len())
            .field("max_size", &self.config.max_size)
            .field("ttl", &self.config.ttl)
            .finish_non_exhaustive()
    }
}

// == Cache Builder ==
/// Fluent construction for [`LoadingCache`].
pub struct CacheBuilder<K, V, E> {
    config: CacheConfig,
    /// Ties the builder to the cache's key, value, and error types
    _loader: PhantomData<fn(&K) -> Result<V, E>>,
}

impl<K, V, E> CacheBuilder<K, V, E> {
    /// Starts from the default bounds (1000 entries, 300 s TTL).
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            _loader: PhantomData,
        }
    }

    /// Sets the capacity bound.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.config.max_size = max_size;
        self
    }

    /// Sets the freshness window.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Builds the cache around `loader`.
    pub fn build<F>(self, loader: F) -> Result<LoadingCache<K, V, E>, ConfigError>
    where
        K: Eq + Hash + Clone,
        V: Clone,
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        LoadingCache::with_config(self.config, loader)
    }
}

impl<K, V, E> Default for CacheBuilder<K, V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, E> fmt::Debug for CacheBuilder<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("config", &self.config)
            .finish()
    }
}
