//! Keyed Cache - generic in-memory key-value caches
//!
//! Two variants share one validated contract: [`LocalCache`] for a single
//! owner and [`ConcurrentCache`] for shared use, which adds atomic
//! `get_or_add` / `add_or_update`. Every entry carries a [`Policy`] that is
//! stored as metadata and never enforced.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{Cache, ConcurrentCache, Entry, LocalCache, Policy};
pub use config::Config;
pub use error::{CacheError, Result};
