//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Policy, DEFAULT_CACHE_NAME, DEFAULT_SLIDING_EXPIRATION};
use crate::error::Result;

/// Cache construction parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Label used in logs and disposal errors
    pub name: String,
    /// Number of entries to preallocate storage for
    pub initial_capacity: usize,
    /// Sliding expiration in seconds of the policy applied when none is given
    pub default_sliding_secs: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAME` - Cache label (default: "default")
    /// - `CACHE_INITIAL_CAPACITY` - Preallocated entries (default: 0)
    /// - `CACHE_DEFAULT_SLIDING_SECS` - Default sliding expiration (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            name: env::var("CACHE_NAME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.name),
            initial_capacity: env::var("CACHE_INITIAL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.initial_capacity),
            default_sliding_secs: env::var("CACHE_DEFAULT_SLIDING_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_sliding_secs),
        }
    }

    /// Resolves the policy entries get when callers pass none.
    ///
    /// The process-wide shared policy is reused when the configured period
    /// matches it.
    ///
    /// # Errors
    /// `InvalidArgument` if `default_sliding_secs` is zero.
    pub fn default_policy(&self) -> Result<Arc<Policy>> {
        let period = Duration::from_secs(self.default_sliding_secs);
        if period == DEFAULT_SLIDING_EXPIRATION {
            return Ok(Policy::default_shared());
        }
        Ok(Arc::new(Policy::sliding(period)?))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: DEFAULT_CACHE_NAME.to_string(),
            initial_capacity: 0,
            default_sliding_secs: DEFAULT_SLIDING_EXPIRATION.as_secs(),
        }
    }
}
