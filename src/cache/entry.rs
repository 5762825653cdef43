//! Cache Entry Module
//!
//! Defines the immutable value-plus-deadline pair held by the entry store.

use std::time::{Duration, Instant};

/// Stand-in deadline for TTLs too large for instant arithmetic; several
/// decades out, far beyond any cache's horizon.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

// == Cache Entry ==
/// A single cached value together with its expiry deadline.
///
/// Entries are never mutated in place: a reload publishes a replacement
/// entry. Freshness is judged against a caller-supplied instant so that one
/// `now` reading can be reused across a whole lookup.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Deadline after which the entry is logically expired
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry that stays fresh for `ttl` from now.
    ///
    /// A `ttl` too large to land on a representable deadline (such as
    /// `Duration::MAX`) saturates decades into the future instead of
    /// overflowing, so "effectively never expires" is a usable setting.
    pub fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            expires_at: now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE),
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry is expired once `now` reaches its
    /// deadline, so an entry created with a zero TTL is expired from birth.
    ///
    /// # Returns
    /// - `true` if `now` is at or past the deadline
    /// - `false` while the deadline lies in the future
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    // == Time Remaining ==
    /// Returns the freshness window left as of `now`.
    ///
    /// This method is useful for debugging and statistics purposes.
    ///
    /// # Returns
    /// - `Duration::ZERO` if the entry has expired
    /// - the remaining window otherwise
    pub fn time_remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}
