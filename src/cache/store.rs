//! Entry Store Module
//!
//! Concurrent key-to-entry map underpinning the cache's lock-free read path.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use dashmap::DashMap;

use crate::cache::CacheEntry;

// == Entry Store ==
/// Authoritative key-to-entry mapping.
///
/// Lookups go straight to the sharded map with no cache-wide lock, and a
/// publish made by one thread is visible to every subsequent lookup from
/// any other thread. Expiry is lazy: a stale entry stays physically present
/// until overwritten, evicted, or purged, so callers judge freshness with
/// [`CacheEntry::is_expired`] rather than trusting mere presence.
#[derive(Debug)]
pub struct EntryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Key-value storage
    entries: DashMap<K, CacheEntry<V>>,
}

impl<K, V> EntryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    // == Lookup ==
    /// Returns a clone of the entry for `key`, expired or not.
    ///
    /// Freshness is the caller's judgement; returning stale entries lets
    /// the caller distinguish "absent" from "present but expired".
    pub fn lookup(&self, key: &K) -> Option<CacheEntry<V>> {
        self.entries.get(key).map(|item| item.value().clone())
    }

    // == Publish ==
    /// Inserts or overwrites the entry for `key`.
    ///
    /// Called only by the thread holding the key's in-flight load, so two
    /// publishes for one key never race each other.
    pub fn publish(&self, key: K, entry: CacheEntry<V>) {
        self.entries.insert(key, entry);
    }

    // == Remove ==
    /// Removes the entry for `key`, returning it if present.
    pub fn remove(&self, key: &K) -> Option<CacheEntry<V>> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    // == Snapshot ==
    /// Returns every entry still fresh as of `now` as a plain map.
    ///
    /// Best-effort point-in-time view: entries inserted while the scan is
    /// in progress may be omitted, and the scan never panics under
    /// concurrent mutation.
    pub fn snapshot(&self, now: Instant) -> HashMap<K, V> {
        self.entries
            .iter()
            .filter(|item| !item.value().is_expired(now))
            .map(|item| (item.key().clone(), item.value().value.clone()))
            .collect()
    }

    // == Expired Keys ==
    /// Collects every key whose entry has expired as of `now`.
    ///
    /// A scan, not a removal: pair with
    /// [`remove_if_expired`](Self::remove_if_expired) so a key reloaded
    /// fresh after the scan is not swept away with the stale ones.
    pub fn expired_keys(&self, now: Instant) -> Vec<K> {
        self.entries
            .iter()
            .filter(|item| item.value().is_expired(now))
            .map(|item| item.key().clone())
            .collect()
    }

    // == Remove If Expired ==
    /// Removes `key` only if its entry is still expired as of `now`.
    ///
    /// The expiry re-check and the removal happen under the key's shard
    /// lock, so a concurrent fresh publish either lands before (and keeps
    /// the entry) or after (and restores the key).
    pub fn remove_if_expired(&self, key: &K, now: Instant) -> bool {
        self.entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    // == Length ==
    /// Returns the current physical entry count.
    ///
    /// Logically-expired entries that have not yet been evicted or purged
    /// are included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
