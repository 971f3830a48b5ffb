//! Cache Policy Module
//!
//! Expiration metadata attached to every cache entry. The cache stores
//! policies but never evaluates them: no sweeper, no TTL check.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

use crate::cache::DEFAULT_SLIDING_EXPIRATION;
use crate::error::{CacheError, Result};

/// Process-wide policy used whenever an operation is given none.
static DEFAULT_POLICY: Lazy<Arc<Policy>> = Lazy::new(|| {
    Arc::new(Policy::with_expiration(
        None,
        Some(DEFAULT_SLIDING_EXPIRATION),
    ))
});

// == Change Monitor ==
/// Opaque change-trigger handle attached to a policy.
///
/// The cache never inspects or fires monitors; they exist for layers that
/// build enforcement on top of it.
pub trait ChangeMonitor: Send + Sync + fmt::Debug {
    /// Identifier of the monitored resource.
    fn unique_id(&self) -> &str;
}

// == Policy Event ==
/// Lifecycle events a policy can announce to its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyEvent {
    Adding,
    Added,
    Updating,
    Updated,
    Removing,
    Removed,
}

/// Subscriber callback for [`PolicyEvent`]s.
pub type PolicyHandler = Arc<dyn Fn(&Policy, PolicyEvent) + Send + Sync>;

// == Policy ==
/// Expiration metadata for a cache entry.
///
/// A policy carries either an absolute expiration or a sliding one. Two
/// policies are equal when both expiration fields match; priority, change
/// monitors and subscribers do not take part in equality.
pub struct Policy {
    absolute_expiration: Option<DateTime<Utc>>,
    sliding_expiration: Option<Duration>,
    priority: AtomicI32,
    change_monitors: Vec<Arc<dyn ChangeMonitor>>,
    handlers: Vec<(PolicyEvent, PolicyHandler)>,
}

impl Policy {
    fn with_expiration(
        absolute_expiration: Option<DateTime<Utc>>,
        sliding_expiration: Option<Duration>,
    ) -> Self {
        Self {
            absolute_expiration,
            sliding_expiration,
            priority: AtomicI32::new(0),
            change_monitors: Vec::new(),
            handlers: Vec::new(),
        }
    }

    // == Constructors ==
    /// Creates a policy that expires at a fixed point in time.
    ///
    /// # Errors
    /// `InvalidArgument` unless `at` is strictly in the future.
    pub fn absolute(at: DateTime<Utc>) -> Result<Self> {
        if at <= Utc::now() {
            return Err(CacheError::invalid(
                "absolute_expiration",
                format!("{} must be in the future", at.to_rfc3339()),
            ));
        }

        Ok(Self::with_expiration(Some(at), None))
    }

    /// Creates a policy that expires after a period without access.
    ///
    /// # Errors
    /// `InvalidArgument` if `period` is zero.
    pub fn sliding(period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(CacheError::invalid(
                "sliding_expiration",
                "must be greater than zero",
            ));
        }

        Ok(Self::with_expiration(None, Some(period)))
    }

    /// Returns the shared process-wide default policy (1 minute sliding).
    pub fn default_shared() -> Arc<Policy> {
        Arc::clone(&DEFAULT_POLICY)
    }

    // == Accessors ==
    pub fn absolute_expiration(&self) -> Option<DateTime<Utc>> {
        self.absolute_expiration
    }

    pub fn sliding_expiration(&self) -> Option<Duration> {
        self.sliding_expiration
    }

    pub fn priority(&self) -> i32 {
        self.priority.load(Ordering::Relaxed)
    }

    /// Updates the priority. Allowed after the policy is attached to entries.
    pub fn set_priority(&self, priority: i32) {
        self.priority.store(priority, Ordering::Relaxed);
    }

    // == Change Monitors ==
    /// Read-only view of the attached change monitors, in insertion order.
    pub fn change_monitors(&self) -> &[Arc<dyn ChangeMonitor>] {
        &self.change_monitors
    }

    pub fn add_change_monitor(&mut self, monitor: Arc<dyn ChangeMonitor>) {
        self.change_monitors.push(monitor);
    }

    /// Detaches the first occurrence of `monitor` (compared by identity).
    ///
    /// Returns whether a monitor was removed.
    pub fn remove_change_monitor(&mut self, monitor: &Arc<dyn ChangeMonitor>) -> bool {
        match self
            .change_monitors
            .iter()
            .position(|m| Arc::ptr_eq(m, monitor))
        {
            Some(index) => {
                self.change_monitors.remove(index);
                true
            }
            None => false,
        }
    }

    // == Lifecycle Hooks ==
    /// Registers `handler` to run whenever `event` is raised on this policy.
    pub fn subscribe<F>(&mut self, event: PolicyEvent, handler: F)
    where
        F: Fn(&Policy, PolicyEvent) + Send + Sync + 'static,
    {
        self.handlers.push((event, Arc::new(handler)));
    }

    /// Invokes every subscriber of `event` in registration order.
    ///
    /// Returns the number of handlers invoked.
    pub fn raise(&self, event: PolicyEvent) -> usize {
        let mut invoked = 0;
        for (_, handler) in self.handlers.iter().filter(|(e, _)| *e == event) {
            handler(self, event);
            invoked += 1;
        }
        invoked
    }
}

impl PartialEq for Policy {
    fn eq(&self, other: &Self) -> bool {
        self.absolute_expiration == other.absolute_expiration
            && self.sliding_expiration == other.sliding_expiration
    }
}

impl Eq for Policy {}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("absolute_expiration", &self.absolute_expiration)
            .field("sliding_expiration", &self.sliding_expiration)
            .field("priority", &self.priority())
            .field("change_monitors", &self.change_monitors)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
