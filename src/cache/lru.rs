//! LRU Tracker Module
//!
//! Implements approximate least-recently-used tracking for cache eviction.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

// == LRU Tracker ==
/// Tracks access recency for the eviction policy.
///
/// Every `touch` stamps the key with the next tick of a shared logical
/// clock; the smallest stamp marks the least recently used key. The
/// ordering is intentionally approximate: concurrent touches of the same
/// key race over which stamp wins, and a key touched while an eviction scan
/// is in progress may still be selected as oldest. Sequenced calls observe
/// exact LRU order; concurrent callers get a best-effort candidate, which
/// is all eviction needs.
#[derive(Debug, Default)]
pub struct LruTracker<K>
where
    K: Eq + Hash + Clone,
{
    /// Last-access stamp per key
    stamps: DashMap<K, u64>,
    /// Monotonic logical clock feeding the stamps
    clock: AtomicU64,
}

impl<K> LruTracker<K>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            stamps: DashMap::new(),
            clock: AtomicU64::new(0),
        }
    }

    // == Touch ==
    /// Marks a key as most recently used.
    ///
    /// Existing stamps are overwritten; touching an untracked key starts
    /// tracking it. Two threads touching the same key concurrently may
    /// finish in either order, leaving the earlier stamp in place.
    pub fn touch(&self, key: &K) {
        let stamp = self.clock.fetch_add(1, Ordering::Relaxed);
        self.stamps.insert(key.clone(), stamp);
    }

    // == Remove ==
    /// Stops tracking a key.
    pub fn remove(&self, key: &K) {
        self.stamps.remove(key);
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used key.
    ///
    /// Scans for the smallest stamp, then removes it. A touch landing
    /// between the scan and the removal can cause a just-refreshed key to
    /// be returned; accepted imprecision. Returns `None` if the tracker is
    /// empty or the candidate vanished before it could be removed.
    pub fn evict_oldest(&self) -> Option<K> {
        let candidate = self.oldest_key()?;
        self.stamps.remove(&candidate).map(|(key, _)| key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    #[allow(dead_code)]
    pub fn peek_oldest(&self) -> Option<K> {
        self.oldest_key()
    }

    /// Finds the key with the smallest stamp. The scan visits shards in
    /// turn, so entries inserted concurrently may be missed.
    fn oldest_key(&self) -> Option<K> {
        let mut oldest: Option<(K, u64)> = None;
        for entry in self.stamps.iter() {
            let replace = match &oldest {
                Some((_, stamp)) => *entry.value() < *stamp,
                None => true,
            };
            if replace {
                oldest = Some((entry.key().clone(), *entry.value()));
            }
        }
        oldest.map(|(key, _)| key)
    }

    // == Clear ==
    /// Drops every tracked key.
    pub fn clear(&self) {
        self.stamps.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    // == Is Empty ==
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    #[allow(dead_code)]
    pub fn contains(&self, key: &K) -> bool {
        self.stamps.contains_key(key)
    }
}
