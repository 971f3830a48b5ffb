//! Cache Store Module
//!
//! The generic cache: a validation layer in front of a storage strategy.
//!
//! Every operation checks the lifecycle state first, then performs exactly
//! one storage call. `LocalCache` is the single-owner variant; its storage is
//! not `Sync`, so sharing it across threads does not compile.
//! `ConcurrentCache` may be shared freely and adds the atomic `get_or_add`
//! and `add_or_update` primitives.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::vec;

use tracing::{debug, trace};

use crate::cache::{
    AtomicStorage, CacheStats, ConcurrentStorage, Entry, LocalStorage, Outcome, Policy,
    SharedEntry, Storage, DEFAULT_CACHE_NAME,
};
use crate::config::Config;
use crate::error::{CacheError, Result};

/// Single-owner cache. Not thread safe.
pub type LocalCache<K, V> = Cache<K, V, LocalStorage<K, V>>;

/// Thread-safe cache with atomic compound operations.
pub type ConcurrentCache<K, V> = Cache<K, V, ConcurrentStorage<K, V>>;

// == Lifecycle ==
/// One-way lifecycle of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Live = 0,
    Disposed = 1,
}

// == Cache ==
/// A named key-value cache whose entries carry a [`Policy`].
///
/// Policies are stored, never enforced.
pub struct Cache<K, V, S = LocalStorage<K, V>> {
    name: String,
    storage: S,
    state: AtomicU8,
    default_policy: Arc<Policy>,
    stats: CacheStats,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V, S> Cache<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: Storage<K, V>,
{
    // == Constructors ==
    /// Creates an empty cache named `"default"`.
    pub fn new() -> Self {
        Self::with_name(DEFAULT_CACHE_NAME)
    }

    /// Creates an empty cache labelled `name`.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self::build(name.into(), S::with_capacity(0), Policy::default_shared())
    }

    /// Creates a cache from configuration.
    ///
    /// # Errors
    /// `InvalidArgument` if the configured default policy is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let default_policy = config.default_policy()?;
        Ok(Self::build(
            config.name.clone(),
            S::with_capacity(config.initial_capacity),
            default_policy,
        ))
    }

    fn build(name: String, storage: S, default_policy: Arc<Policy>) -> Self {
        debug!(cache = %name, "cache created");
        Self {
            name,
            storage,
            state: AtomicU8::new(Lifecycle::Live as u8),
            default_policy,
            stats: CacheStats::new(),
            _types: PhantomData,
        }
    }

    // == Accessors ==
    /// Returns the label given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the operation counters of this cache.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Returns the current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        if self.state.load(Ordering::Acquire) == Lifecycle::Disposed as u8 {
            Lifecycle::Disposed
        } else {
            Lifecycle::Live
        }
    }

    /// True once [`Cache::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.lifecycle() == Lifecycle::Disposed
    }

    /// Number of live entries.
    pub fn count(&self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.storage.len())
    }

    // == Insertion ==
    /// Inserts a new entry.
    ///
    /// # Errors
    /// `DuplicateKey` if `key` is already present; `ObjectDisposed` after disposal.
    pub fn add(&self, key: K, value: V, policy: Option<Arc<Policy>>) -> Result<()> {
        self.ensure_live()?;

        if self.insert_trusted(key, value, policy) {
            Ok(())
        } else {
            Err(CacheError::DuplicateKey(self.name.clone()))
        }
    }

    /// Inserts a new entry unless `key` is present. Returns whether it inserted.
    pub fn try_add(&self, key: K, value: V, policy: Option<Arc<Policy>>) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.insert_trusted(key, value, policy))
    }

    /// Inserts the entry, or overwrites the existing one.
    ///
    /// Performed as one storage upsert, so the concurrent variant never
    /// exposes the gap between the add attempt and the overwrite.
    pub fn add_or_set(&self, key: K, value: V, policy: Option<Arc<Policy>>) -> Result<()> {
        self.ensure_live()?;
        self.replace_trusted(key, value, policy);
        Ok(())
    }

    /// Inserts or replaces the entry for `key`.
    pub fn set(&self, key: K, value: V, policy: Option<Arc<Policy>>) -> Result<()> {
        self.ensure_live()?;
        self.replace_trusted(key, value, policy);
        Ok(())
    }

    // == Lookup ==
    /// Returns the value stored for `key`.
    ///
    /// # Errors
    /// `KeyNotFound` if `key` is absent.
    pub fn get<Q>(&self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ensure_live()?;

        match self.lookup(key) {
            Some(entry) => Ok(entry.value().clone()),
            None => Err(CacheError::KeyNotFound(self.name.clone())),
        }
    }

    /// Returns the value for `key`, or `default` when it is absent.
    pub fn get_or<Q>(&self, key: &Q, default: Option<V>) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ensure_live()?;
        Ok(self
            .lookup(key)
            .map(|entry| entry.value().clone())
            .or(default))
    }

    /// Returns the value for `key` without failing when it is absent.
    pub fn try_get<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ensure_live()?;
        Ok(self.lookup(key).map(|entry| entry.value().clone()))
    }

    /// Returns the whole entry for `key`, policy included.
    pub fn get_entry<Q>(&self, key: &Q) -> Result<Option<SharedEntry<V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ensure_live()?;
        Ok(self.lookup(key))
    }

    /// Indexed lookup for callers holding a possibly absent key.
    ///
    /// The key is checked before the lifecycle state.
    ///
    /// # Errors
    /// `ArgumentNull` if `key` is `None`, otherwise as [`Cache::get`].
    pub fn item<Q>(&self, key: Option<&Q>) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let key = key.ok_or(CacheError::ArgumentNull("key"))?;
        self.get(key)
    }

    /// Checks whether `key` is present, without touching the counters.
    pub fn contains_key<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ensure_live()?;
        Ok(self.storage.contains_key(key))
    }

    // == Removal ==
    /// Removes the entry for `key`. Returns whether one was removed.
    pub fn remove<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ensure_live()?;

        let removed = self.storage.remove(key);
        if removed {
            self.stats.record_removal();
            trace!(cache = %self.name, "entry removed");
        }
        Ok(removed)
    }

    // == Iteration ==
    /// Iterates over the `(key, entry)` pairs present when the call is made.
    ///
    /// The pairs are copied out first, so the cache may be mutated while the
    /// iterator is consumed. For a concurrent cache the copy is weakly
    /// consistent across keys.
    pub fn iter(&self) -> Result<Iter<K, V>> {
        self.ensure_live()?;
        Ok(Iter {
            inner: self.storage.snapshot().into_iter(),
        })
    }

    // == Disposal ==
    /// Disposes the cache. Idempotent.
    ///
    /// The state flips first, so new operations are rejected before the
    /// storage release hook runs. Stored entries are not cleared.
    pub fn dispose(&self) {
        let claimed = self
            .state
            .compare_exchange(
                Lifecycle::Live as u8,
                Lifecycle::Disposed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if claimed {
            self.storage.release();
            debug!(cache = %self.name, "cache disposed");
        }
    }

    // == Internals ==
    fn ensure_live(&self) -> Result<()> {
        match self.lifecycle() {
            Lifecycle::Live => Ok(()),
            Lifecycle::Disposed => Err(CacheError::ObjectDisposed(self.name.clone())),
        }
    }

    fn policy_or_default(&self, policy: Option<Arc<Policy>>) -> Arc<Policy> {
        policy.unwrap_or_else(|| Arc::clone(&self.default_policy))
    }

    fn lookup<Q>(&self, key: &Q) -> Option<SharedEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let found = self.storage.get(key);
        if found.is_some() {
            self.stats.record_hit();
            trace!(cache = %self.name, "cache hit");
        } else {
            self.stats.record_miss();
            trace!(cache = %self.name, "cache miss");
        }
        found
    }

    fn insert_trusted(&self, key: K, value: V, policy: Option<Arc<Policy>>) -> bool {
        let entry = Arc::new(Entry::cached(value, self.policy_or_default(policy)));
        let inserted = self.storage.insert_trusted(key, entry);
        if inserted {
            self.record_write(Outcome::Inserted);
        }
        inserted
    }

    fn replace_trusted(&self, key: K, value: V, policy: Option<Arc<Policy>>) {
        let entry = Arc::new(Entry::cached(value, self.policy_or_default(policy)));
        let outcome = self.storage.replace_trusted(key, entry);
        self.record_write(outcome);
    }

    /// Counts an atomic lookup-then-insert: a fresh insert also missed.
    fn record_atomic(&self, outcome: Outcome) {
        if outcome == Outcome::Inserted {
            self.stats.record_miss();
        }
        self.record_write(outcome);
    }

    fn record_write(&self, outcome: Outcome) {
        match outcome {
            Outcome::Inserted => {
                self.stats.record_insert();
                trace!(cache = %self.name, "entry inserted");
            }
            Outcome::Updated => {
                self.stats.record_update();
                trace!(cache = %self.name, "entry updated");
            }
            Outcome::Existing => {
                self.stats.record_hit();
                trace!(cache = %self.name, "cache hit");
            }
        }
    }
}

// == Atomic Operations ==
impl<K, V, S> Cache<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: AtomicStorage<K, V>,
{
    /// Returns the stored value for `key`, inserting `value` if absent.
    ///
    /// Racing callers all observe the single value that won.
    pub fn get_or_add(&self, key: K, value: V, policy: Option<Arc<Policy>>) -> Result<V> {
        self.get_or_add_with(key, move |_| value, policy)
    }

    /// Returns the stored value for `key`, inserting `factory(&key)` if absent.
    ///
    /// `factory` is not called when the key is present. Under contention it
    /// may run in several callers, but only one result is stored and every
    /// caller receives that one.
    pub fn get_or_add_with<F>(&self, key: K, factory: F, policy: Option<Arc<Policy>>) -> Result<V>
    where
        F: FnOnce(&K) -> V,
    {
        self.ensure_live()?;

        let policy = self.policy_or_default(policy);
        let (entry, outcome) = self
            .storage
            .get_or_insert_with(key, |k| Entry::new(factory(k), Some(policy)));
        self.record_atomic(outcome);

        Ok(entry.value().clone())
    }

    /// Inserts `add(&key)` if `key` is absent, otherwise replaces the value
    /// with `update(&key, &current)`. Returns the value that was stored.
    ///
    /// Either factory may be re-run when another writer changes the entry
    /// in between; the stored result always derives from the value it
    /// replaced.
    pub fn add_or_update<A, U>(
        &self,
        key: K,
        mut add: A,
        mut update: U,
        policy: Option<Arc<Policy>>,
    ) -> Result<V>
    where
        A: FnMut(&K) -> V,
        U: FnMut(&K, &V) -> V,
    {
        self.ensure_live()?;

        let policy = self.policy_or_default(policy);
        let (entry, outcome) = self.storage.upsert(
            key,
            |k| Entry::new(add(k), Some(Arc::clone(&policy))),
            |k, current| Entry::new(update(k, current.value()), Some(Arc::clone(&policy))),
        );
        self.record_atomic(outcome);

        Ok(entry.value().clone())
    }
}

impl<K, V, S> Default for Cache<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: Storage<K, V>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> fmt::Debug for Cache<K, V, S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("disposed", &(self.state.load(Ordering::Acquire) != 0))
            .field("storage", &self.storage)
            .finish()
    }
}

// == Iterator ==
/// Iterator over a copy of the cache contents taken by [`Cache::iter`].
#[derive(Debug)]
pub struct Iter<K, V> {
    inner: vec::IntoIter<(K, SharedEntry<V>)>,
}

impl<K, V> Iterator for Iter<K, V> {
    type Item = (K, SharedEntry<V>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<K, V> {}
