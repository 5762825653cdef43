//! Memocache - a concurrent memoizing cache
//!
//! Computes each value at most once per miss, even under a stampede of
//! concurrent callers, with TTL expiration and approximate LRU eviction.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheBuilder, CacheStats, Loader, LoadingCache};
pub use config::CacheConfig;
pub use error::ConfigError;
