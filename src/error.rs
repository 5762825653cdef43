//! Error types for the cache
//!
//! Provides construction-time error handling using thiserror.

use thiserror::Error;

// == Config Error Enum ==
/// Rejected cache configuration.
///
/// This is the crate's only owned error type. Runtime loads deliberately
/// have none: a loader's error `E` is returned to the calling thread
/// unchanged, never wrapped, stored, or shared with other callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Capacity bound of zero
    #[error("max_size must be at least 1")]
    ZeroMaxSize,
}
