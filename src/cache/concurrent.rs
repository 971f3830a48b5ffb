//! Concurrent Storage Module
//!
//! `DashMap`-backed storage whose single-key operations and compound
//! primitives are atomic.
//!
//! ## Compound primitives
//!
//! `get_or_insert_with` and `upsert` run their factories outside any shard
//! lock, then commit with a compare-and-swap on entry identity under the
//! shard lock of the key. A caller that loses the race either adopts the
//! winner's entry (`get_or_insert_with`) or recomputes from the new current
//! entry (`upsert`). Consequences:
//! - factories may be invoked more than once across racing callers
//! - factories may read or write the same storage without deadlocking
//! - the map never holds two entries for one key

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tracing::trace;

use crate::cache::{AtomicStorage, Entry, Outcome, SharedEntry, Storage};

// == Concurrent Storage ==
/// Thread-safe storage with fine-grained, per-shard locking.
pub struct ConcurrentStorage<K, V> {
    map: DashMap<K, SharedEntry<V>>,
}

impl<K, V> Default for ConcurrentStorage<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            map: DashMap::new(),
        }
    }
}

impl<K, V> fmt::Debug for ConcurrentStorage<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentStorage")
            .field("len", &self.map.len())
            .finish()
    }
}

impl<K, V> Storage<K, V> for ConcurrentStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn with_capacity(capacity: usize) -> Self {
        Self {
            map: DashMap::with_capacity(capacity),
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn get<Q>(&self, key: &Q) -> Option<SharedEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        // Clone the Arc so the shard read guard is released before returning.
        self.map.get(key).map(|r| Arc::clone(r.value()))
    }

    fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    fn insert_trusted(&self, key: K, entry: SharedEntry<V>) -> bool {
        match self.map.entry(key) {
            MapEntry::Occupied(_) => false,
            MapEntry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    fn replace_trusted(&self, key: K, entry: SharedEntry<V>) -> Outcome {
        match self.map.insert(key, entry) {
            Some(_) => Outcome::Updated,
            None => Outcome::Inserted,
        }
    }

    fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove(key).is_some()
    }

    /// Shards are visited one at a time, so the copy is weakly consistent.
    fn snapshot(&self) -> Vec<(K, SharedEntry<V>)> {
        self.map
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect()
    }
}

impl<K, V> AtomicStorage<K, V> for ConcurrentStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn get_or_insert_with<F>(&self, key: K, make: F) -> (SharedEntry<V>, Outcome)
    where
        F: FnOnce(&K) -> Entry<V>,
    {
        if let Some(existing) = self.get(&key) {
            return (existing, Outcome::Existing);
        }

        let candidate = Arc::new(make(&key));
        match self.map.entry(key) {
            MapEntry::Occupied(slot) => {
                trace!("get_or_insert lost a race, adopting stored entry");
                (Arc::clone(slot.get()), Outcome::Existing)
            }
            MapEntry::Vacant(slot) => {
                slot.insert(Arc::clone(&candidate));
                (candidate, Outcome::Inserted)
            }
        }
    }

    fn upsert<A, U>(&self, key: K, mut add: A, mut update: U) -> (SharedEntry<V>, Outcome)
    where
        A: FnMut(&K) -> Entry<V>,
        U: FnMut(&K, &Entry<V>) -> Entry<V>,
    {
        loop {
            match self.get(&key) {
                None => {
                    let candidate = Arc::new(add(&key));
                    if let MapEntry::Vacant(slot) = self.map.entry(key.clone()) {
                        slot.insert(Arc::clone(&candidate));
                        return (candidate, Outcome::Inserted);
                    }
                }
                Some(current) => {
                    let candidate = Arc::new(update(&key, &current));
                    if let MapEntry::Occupied(mut slot) = self.map.entry(key.clone()) {
                        // `current` is still held, so its address cannot be reused.
                        if Arc::ptr_eq(slot.get(), &current) {
                            slot.insert(Arc::clone(&candidate));
                            return (candidate, Outcome::Updated);
                        }
                    }
                }
            }
            trace!("upsert lost a race, retrying");
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn entry(value: u64) -> Entry<u64> {
        Entry::new(value, None)
    }

    #[test]
    fn test_get_or_insert_skips_factory_when_present() {
        let storage = ConcurrentStorage::default();
        storage.insert_trusted("k", Arc::new(entry(1)));

        let (found, outcome) =
            storage.get_or_insert_with("k", |_| panic!("factory must not run"));

        assert_eq!(*found.value(), 1);
        assert_eq!(outcome, Outcome::Existing);
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let storage = ConcurrentStorage::default();

        let (first, outcome) = storage.upsert("k", |_| entry(1), |_, e| entry(e.value() + 1));
        assert_eq!(*first.value(), 1);
        assert_eq!(outcome, Outcome::Inserted);

        let (second, outcome) = storage.upsert("k", |_| entry(1), |_, e| entry(e.value() + 1));
        assert_eq!(*second.value(), 2);
        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_factory_may_reenter_storage() {
        let storage = ConcurrentStorage::default();
        storage.insert_trusted("base", Arc::new(entry(10)));

        let (derived, _) = storage.get_or_insert_with("derived", |_| {
            let base = storage.get("base").map(|e| *e.value()).unwrap_or(0);
            entry(base * 2)
        });

        assert_eq!(*derived.value(), 20);
    }

    #[test]
    fn test_upsert_retries_when_entry_changes_underneath() {
        let storage = ConcurrentStorage::default();
        storage.insert_trusted("k", Arc::new(entry(0)));
        let attempts = AtomicUsize::new(0);

        let (result, outcome) = storage.upsert(
            "k",
            |_| entry(0),
            |_, current| {
                // First attempt: a competing writer replaces the entry.
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    storage.replace_trusted("k", Arc::new(entry(100)));
                }
                entry(current.value() + 1)
            },
        );

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(*result.value(), 101);
        assert_eq!(outcome, Outcome::Updated);
    }

    #[test]
    fn test_concurrent_upsert_counts_every_call() {
        let storage = Arc::new(ConcurrentStorage::default());
        let mut handles = vec![];

        for _ in 0..8 {
            let storage = Arc::clone(&storage);
            handles.push(thread::spawn(move || {
                for _ in 0..250 {
                    storage.upsert("counter", |_| entry(1), |_, e| entry(e.value() + 1));
                }
            }));
        }

        for handle in handles {
            handle.join().expect("Thread panicked");
        }

        assert_eq!(*storage.get("counter").unwrap().value(), 2000);
        assert_eq!(storage.len(), 1);
    }
}
