#![cfg(test)]

// Property tests for KeyedStore kept inside the crate so they do not
// require feature gates to access internal modules.

use crate::store::{Handle, InsertError, KeyedStore};
use proptest::prelude::*;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hasher;
use std::rc::Rc;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertWith(usize, i32),
    Remove(usize),
    Find(usize),
    Contains(String),
    Clear,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::InsertWith(i, v)),
            3 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::Find),
            1 => prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            1 => Just(OpI::Clear),
            2 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Model: a HashMap for contents plus a Vec recording insertion order.
#[derive(Default)]
struct Model {
    map: HashMap<Key, i32>,
    order: Vec<Key>,
}

impl Model {
    fn insert(&mut self, k: Key, v: i32) {
        self.map.insert(k.clone(), v);
        self.order.push(k);
    }
    fn remove(&mut self, k: &Key) -> Option<i32> {
        self.order.retain(|x| x != k);
        self.map.remove(k)
    }
    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}

fn run_state_machine<S>(
    mut sut: KeyedStore<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    S: std::hash::BuildHasher,
{
    let mut model = Model::default();
    let mut live: HashMap<Key, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();

    let default_calls = Rc::new(Cell::new(0));
    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(&pool, i);
                let already = model.map.contains_key(&k);
                match sut.insert(k.clone(), v) {
                    Ok(h) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        let prev = live.insert(k.clone(), h);
                        prop_assert!(prev.is_none());
                        model.insert(k, v);
                    }
                    Err(InsertError::DuplicateKey) => {
                        prop_assert!(already, "duplicate error only when key exists");
                    }
                }
            }
            OpI::InsertWith(i, v) => {
                let k = key_from(&pool, i);
                let already = model.map.contains_key(&k);
                let counter = default_calls.clone();
                let before = counter.get();
                match sut.insert_with(k.clone(), move || {
                    counter.set(counter.get() + 1);
                    v
                }) {
                    Ok(h) => {
                        prop_assert!(!already);
                        prop_assert_eq!(default_calls.get(), before + 1);
                        live.insert(k.clone(), h);
                        model.insert(k, v);
                    }
                    Err(InsertError::DuplicateKey) => {
                        prop_assert!(already);
                        prop_assert_eq!(default_calls.get(), before);
                    }
                }
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                if let Some(h) = live.remove(&k) {
                    let (kk, vv) = sut.remove(h).expect("handle valid for removal");
                    prop_assert!(kk == k);
                    let mv = model.remove(&kk).expect("present in model");
                    prop_assert_eq!(vv, mv);
                    stale.push(h);
                } else {
                    prop_assert!(sut.find(&k.0[..]).is_none());
                    prop_assert!(sut.remove_key(&k.0[..]).is_none());
                }
            }
            OpI::Find(i) => {
                let k = key_from(&pool, i);
                let s = sut.find(&k);
                prop_assert_eq!(s.is_some(), model.map.contains_key(&k));
                if let Some(h) = s {
                    prop_assert_eq!(Some(&h), live.get(&k));
                }
            }
            OpI::Contains(s) => {
                let has = sut.contains_key(s.as_str());
                let has_model = model.map.keys().any(|k| k.0 == s);
                prop_assert_eq!(has, has_model);
            }
            OpI::Clear => {
                let drained = sut.clear();
                prop_assert_eq!(drained.len(), model.map.len());
                stale.extend(live.drain().map(|(_, h)| h));
                model.clear();
            }
            OpI::Iterate => {
                let s_keys: Vec<Key> = sut.iter().map(|(_, k, _)| k.clone()).collect();
                prop_assert_eq!(&s_keys, &model.order);
                let h_keys: Vec<Key> = sut
                    .iter()
                    .map(|(h, _, _)| sut.get(h).map(|(k, _)| k.clone()).expect("live handle"))
                    .collect();
                prop_assert_eq!(&h_keys, &s_keys);
                prop_assert_eq!(sut.keys(), s_keys);
            }
        }

        // Post-conditions after each op
        // 1) All stale handles must not resolve
        for &h in &stale {
            prop_assert!(sut.get(h).is_none());
        }
        // 2) Size parity
        prop_assert_eq!(sut.len(), model.map.len());
        prop_assert_eq!(sut.is_empty(), model.map.is_empty());
    }
    Ok(())
}

// Property: State-machine equivalence against a HashMap plus an order log.
// Invariants exercised across random operation sequences:
// - Duplicate keys are rejected; on success a unique stable Handle is returned.
// - `find`/`contains_key` parity and handle stability for live entries.
// - `remove(handle)` returns the owned `(K,V)` matching the model and invalidates the handle.
// - `clear` drains everything and invalidates every outstanding handle.
// - `iter` and `keys` follow insertion order of live keys.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(KeyedStore::new(), pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl std::hash::BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(KeyedStore::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}
