//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, loads, and
//! evictions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time view of the cache's performance counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Gets served by the lock-free fast path
    pub hits: u64,
    /// Gets that found no fresh entry and entered load coordination
    pub misses: u64,
    /// Loader invocations that returned a value
    pub loads: u64,
    /// Loader invocations that returned an error
    pub load_failures: u64,
    /// Entries evicted by the size bound
    pub evictions: u64,
    /// Physical entry count at snapshot time (may include expired entries)
    pub entries: usize,
    /// Configured capacity bound
    pub max_size: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Shared counters behind [`CacheStats`].
///
/// Counters are relaxed atomics: totals are exact once callers quiesce, but
/// a snapshot taken mid-traffic may show counters from slightly different
/// moments. Good enough for monitoring, which is all they serve.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
}

impl StatsRecorder {
    // == Constructor ==
    /// Creates a recorder with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Load ==
    /// Increments the successful-load counter.
    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Load Failure ==
    /// Increments the failed-load counter.
    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Eviction ==
    /// Increments the eviction counter.
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Captures the counters together with the store's current shape.
    pub fn snapshot(&self, entries: usize, max_size: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries,
            max_size,
        }
    }
}
