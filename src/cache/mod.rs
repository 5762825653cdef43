//! Cache Module
//!
//! Provides concurrent memoization with TTL expiration, approximate LRU
//! eviction, and per-key single-flight load coordination.

mod entry;
mod flight;
mod loading;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use loading::{CacheBuilder, Loader, LoadingCache};
pub use stats::CacheStats;

// Internal plumbing shared across the module
pub(crate) use entry::CacheEntry;
pub(crate) use flight::{Claim, FlightGuard, FlightTable};
pub(crate) use lru::LruTracker;
pub(crate) use stats::StatsRecorder;
pub(crate) use store::EntryStore;
