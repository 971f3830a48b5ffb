//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache and policy operations.
///
/// Every error is raised synchronously to the caller; nothing is retried
/// or logged inside the crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A required argument was absent
    #[error("Argument must not be absent: {0}")]
    ArgumentNull(&'static str),

    /// An argument was present but malformed
    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Name of the offending argument
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Strict lookup on a missing key (carries the cache name)
    #[error("Key not found in cache: {0}")]
    KeyNotFound(String),

    /// Strict insertion of a key that is already present (carries the cache name)
    #[error("An entry with the same key already exists in cache: {0}")]
    DuplicateKey(String),

    /// Any operation on a disposed cache (carries the cache name)
    #[error("Cannot access a disposed cache: {0}")]
    ObjectDisposed(String),
}

impl CacheError {
    /// Shorthand for [`CacheError::InvalidArgument`].
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        CacheError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = CacheError::ObjectDisposed("sessions".to_string());
        assert_eq!(err.to_string(), "Cannot access a disposed cache: sessions");

        let err = CacheError::invalid("sliding_expiration", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid argument `sliding_expiration`: must be greater than zero"
        );

        let err = CacheError::ArgumentNull("key");
        assert!(err.to_string().contains("key"));
    }
}
