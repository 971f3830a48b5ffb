//! Storage Strategy Module
//!
//! Capability traits the cache layer delegates to, and the single-owner
//! `HashMap` storage.
//!
//! The cache validates every call (disposal, arguments) and then performs
//! exactly one storage call. Storages only see trusted input.

use std::borrow::Borrow;
use std::cell::RefCell;
use std::collections::hash_map::{self, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::{Entry, SharedEntry};

// == Outcome ==
/// What a write did to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The key was absent and a new entry was stored
    Inserted,
    /// An existing entry was replaced
    Updated,
    /// An existing entry was returned untouched
    Existing,
}

// == Storage ==
/// Key-to-entry map operations that every cache variant needs.
///
/// Each method is a single map operation. Implementations decide whether
/// those operations may run concurrently.
pub trait Storage<K, V> {
    /// Creates an empty storage sized for `capacity` entries.
    fn with_capacity(capacity: usize) -> Self
    where
        Self: Sized;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get<Q>(&self, key: &Q) -> Option<SharedEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized;

    fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized;

    /// Inserts `entry` if `key` is absent. Returns false if it was present.
    fn insert_trusted(&self, key: K, entry: SharedEntry<V>) -> bool;

    /// Inserts or replaces the entry for `key`.
    fn replace_trusted(&self, key: K, entry: SharedEntry<V>) -> Outcome;

    fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized;

    /// Copies out the current `(key, entry)` pairs.
    fn snapshot(&self) -> Vec<(K, SharedEntry<V>)>;

    /// Releases resources owned by the storage. Called once, on first disposal.
    fn release(&self) {}
}

// == Atomic Storage ==
/// Storage whose compound read-modify-write operations are atomic.
///
/// Factories may run more than once when callers race on the same key, but
/// only one produced entry is ever stored per winning call.
pub trait AtomicStorage<K, V>: Storage<K, V> {
    /// Returns the entry for `key`, inserting `make(&key)` if absent.
    fn get_or_insert_with<F>(&self, key: K, make: F) -> (SharedEntry<V>, Outcome)
    where
        F: FnOnce(&K) -> Entry<V>;

    /// Inserts `add(&key)` if absent, otherwise replaces the current entry
    /// with `update(&key, current)`.
    fn upsert<A, U>(&self, key: K, add: A, update: U) -> (SharedEntry<V>, Outcome)
    where
        A: FnMut(&K) -> Entry<V>,
        U: FnMut(&K, &Entry<V>) -> Entry<V>;
}

// == Local Storage ==
/// Single-owner storage backed by a `HashMap`.
///
/// Uses a `RefCell`, so it is not `Sync`: a cache built on it cannot be
/// shared between threads.
#[derive(Debug)]
pub struct LocalStorage<K, V> {
    map: RefCell<HashMap<K, SharedEntry<V>>>,
}

impl<K, V> Default for LocalStorage<K, V> {
    fn default() -> Self {
        Self {
            map: RefCell::new(HashMap::new()),
        }
    }
}

impl<K, V> Storage<K, V> for LocalStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn with_capacity(capacity: usize) -> Self {
        Self {
            map: RefCell::new(HashMap::with_capacity(capacity)),
        }
    }

    fn len(&self) -> usize {
        self.map.borrow().len()
    }

    fn get<Q>(&self, key: &Q) -> Option<SharedEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.borrow().get(key).cloned()
    }

    fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.borrow().contains_key(key)
    }

    fn insert_trusted(&self, key: K, entry: SharedEntry<V>) -> bool {
        match self.map.borrow_mut().entry(key) {
            hash_map::Entry::Occupied(_) => false,
            hash_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    fn replace_trusted(&self, key: K, entry: SharedEntry<V>) -> Outcome {
        match self.map.borrow_mut().insert(key, entry) {
            Some(_) => Outcome::Updated,
            None => Outcome::Inserted,
        }
    }

    fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.borrow_mut().remove(key).is_some()
    }

    fn snapshot(&self) -> Vec<(K, SharedEntry<V>)> {
        self.map
            .borrow()
            .iter()
            .map(|(key, entry)| (key.clone(), Arc::clone(entry)))
            .collect()
    }
}
