//! Cache Module
//!
//! Provides named key-value caches over pluggable storage, with policy
//! metadata attached to every entry.

use std::time::Duration;

mod concurrent;
mod entry;
mod policy;
mod stats;
mod storage;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use concurrent::ConcurrentStorage;
pub use entry::{Entry, SharedEntry};
pub use policy::{ChangeMonitor, Policy, PolicyEvent, PolicyHandler};
pub use stats::{CacheStats, StatsSnapshot};
pub use storage::{AtomicStorage, LocalStorage, Outcome, Storage};
pub use store::{Cache, ConcurrentCache, Iter, Lifecycle, LocalCache};

// == Public Constants ==
/// Name given to caches constructed without one
pub const DEFAULT_CACHE_NAME: &str = "default";

/// Sliding expiration of the process-wide default policy
pub const DEFAULT_SLIDING_EXPIRATION: Duration = Duration::from_secs(60);
