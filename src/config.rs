//! Configuration Module
//!
//! Construction-time settings for a loading cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Capacity bound used when none is given.
pub const DEFAULT_MAX_SIZE: usize = 1000;
/// Freshness window used when none is given.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Cache configuration parameters.
///
/// A config is fixed at construction time; nothing here can change while
/// the cache is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries the cache may hold
    pub max_size: usize,
    /// Freshness window applied to every loaded value
    pub ttl: Duration,
}

impl CacheConfig {
    /// Creates a config with the given bounds.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self { max_size, ttl }
    }

    /// Checks the config for unusable values.
    ///
    /// `max_size` must be at least 1: a cache allowed to hold nothing would
    /// evict each value the moment it was loaded. A zero `ttl` is permitted
    /// and simply makes every entry expired from birth, turning each read
    /// into a coordinated load. An oversized `ttl` (up to `Duration::MAX`)
    /// is permitted too; expiry deadlines saturate rather than overflow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::ZeroMaxSize);
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            ttl: DEFAULT_TTL,
        }
    }
}
