//! Cache Entry Module
//!
//! Defines the (value, policy) pair stored for each key.

use std::sync::Arc;

use crate::cache::Policy;

/// Entries are shared between the map and readers; updates replace them whole.
pub type SharedEntry<V> = Arc<Entry<V>>;

// == Cache Entry ==
/// A stored value together with the policy it was inserted with.
///
/// Entries are immutable once built.
#[derive(Debug)]
pub struct Entry<V> {
    value: V,
    policy: Arc<Policy>,
    cached: bool,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates an entry, falling back to the shared default policy.
    pub fn new(value: V, policy: Option<Arc<Policy>>) -> Self {
        Self {
            value,
            policy: policy.unwrap_or_else(Policy::default_shared),
            cached: false,
        }
    }

    /// Creates an entry through the validated add/set paths.
    pub(crate) fn cached(value: V, policy: Arc<Policy>) -> Self {
        Self {
            value,
            policy,
            cached: true,
        }
    }

    /// Returns the stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the policy the entry was stored with.
    pub fn policy(&self) -> &Arc<Policy> {
        &self.policy
    }

    /// True when the entry was stored via `add`/`set` rather than an atomic
    /// factory primitive.
    pub fn is_cached(&self) -> bool {
        self.cached
    }
}
