//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check both cache variants against a plain `HashMap` model.

use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

use crate::cache::{Cache, ConcurrentStorage, LocalStorage, Policy, Storage};
use crate::error::CacheError;

// == Strategies ==
/// Small key space so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,32}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Add { key: String, value: String },
    TryAdd { key: String, value: String },
    Set { key: String, value: String },
    Get { key: String },
    Remove { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Add { key, value }),
        (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::TryAdd { key, value }),
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Remove { key }),
    ]
}

/// Replays `ops` on a fresh cache and on a model map, comparing every result.
fn check_against_model<S: Storage<String, String>>(
    ops: Vec<CacheOp>,
) -> std::result::Result<(), TestCaseError> {
    let cache: Cache<String, String, S> = Cache::new();
    let mut model: HashMap<String, String> = HashMap::new();

    for op in ops {
        match op {
            CacheOp::Add { key, value } => {
                let result = cache.add(key.clone(), value.clone(), None);
                if model.contains_key(&key) {
                    prop_assert!(matches!(result, Err(CacheError::DuplicateKey(_))));
                } else {
                    prop_assert!(result.is_ok());
                    model.insert(key, value);
                }
            }
            CacheOp::TryAdd { key, value } => {
                let added = cache.try_add(key.clone(), value.clone(), None).unwrap();
                prop_assert_eq!(added, !model.contains_key(&key));
                model.entry(key).or_insert(value);
            }
            CacheOp::Set { key, value } => {
                cache.set(key.clone(), value.clone(), None).unwrap();
                model.insert(key, value);
            }
            CacheOp::Get { key } => {
                prop_assert_eq!(cache.try_get(&key).unwrap(), model.get(&key).cloned());
                prop_assert_eq!(cache.contains_key(&key).unwrap(), model.contains_key(&key));
            }
            CacheOp::Remove { key } => {
                prop_assert_eq!(cache.remove(&key).unwrap(), model.remove(&key).is_some());
            }
        }
        prop_assert_eq!(cache.count().unwrap(), model.len());
    }

    let mut contents: Vec<(String, String)> = cache
        .iter()
        .unwrap()
        .map(|(k, e)| (k, e.value().clone()))
        .collect();
    let mut expected: Vec<(String, String)> = model.into_iter().collect();
    contents.sort();
    expected.sort();
    prop_assert_eq!(contents, expected);

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any operation sequence leaves the local cache equal to the model.
    #[test]
    fn prop_local_cache_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        check_against_model::<LocalStorage<String, String>>(ops)?;
    }

    // Any operation sequence leaves the concurrent cache equal to the model.
    #[test]
    fn prop_concurrent_cache_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        check_against_model::<ConcurrentStorage<String, String>>(ops)?;
    }

    // A second add never disturbs the first value.
    #[test]
    fn prop_duplicate_add_keeps_original(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let cache: Cache<String, String> = Cache::new();

        cache.add(key.clone(), value1.clone(), None).unwrap();
        let count = cache.count().unwrap();

        prop_assert!(cache.add(key.clone(), value2, None).is_err());
        prop_assert_eq!(cache.get(&key).unwrap(), value1);
        prop_assert_eq!(cache.count().unwrap(), count);
    }

    // get_or_add returns whichever value was stored first for the key.
    #[test]
    fn prop_get_or_add_first_writer_wins(
        key in key_strategy(),
        values in prop::collection::vec(value_strategy(), 1..10)
    ) {
        let cache: Cache<String, String, ConcurrentStorage<String, String>> = Cache::new();
        let first = values[0].clone();

        for value in values {
            let stored = cache.get_or_add(key.clone(), value, None).unwrap();
            prop_assert_eq!(&stored, &first);
        }
        prop_assert_eq!(cache.count().unwrap(), 1);
    }

    // add_or_update folds every call into the stored value, in order.
    #[test]
    fn prop_add_or_update_folds_in_order(
        key in key_strategy(),
        parts in prop::collection::vec("[a-z]{1,4}", 1..10)
    ) {
        let cache: Cache<String, String, ConcurrentStorage<String, String>> = Cache::new();

        for part in &parts {
            cache
                .add_or_update(key.clone(), |_| part.clone(), |_, current| format!("{current}{part}"), None)
                .unwrap();
        }

        prop_assert_eq!(cache.get(&key).unwrap(), parts.concat());
    }

    // Policies with the same expiration are equal whatever their priority.
    #[test]
    fn prop_policy_equality_ignores_priority(
        secs in 1u64..10_000,
        p1 in any::<i32>(),
        p2 in any::<i32>()
    ) {
        let a = Policy::sliding(Duration::from_secs(secs)).unwrap();
        let b = Policy::sliding(Duration::from_secs(secs)).unwrap();
        a.set_priority(p1);
        b.set_priority(p2);

        prop_assert_eq!(a, b);
    }
}
