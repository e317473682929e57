//! KeyedStore: insertion-ordered storage layer with stable generational handles.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

/// Stable reference to one stored entry. A handle never resolves to an entry
/// inserted after the one it was issued for, even if the slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

pub struct KeyedStore<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K, V>>,
    // Insertion log; handles of removed entries linger until compaction.
    order: Vec<Handle>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum InsertError {
    DuplicateKey,
}

impl<K, V> KeyedStore<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for KeyedStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over live entries in insertion order.
pub struct Iter<'a, K, V> {
    order: core::slice::Iter<'a, Handle>,
    slots: &'a SlotMap<DefaultKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Handle, &'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        for &h in self.order.by_ref() {
            if let Some(e) = self.slots.get(h.raw_handle()) {
                return Some((h, &e.key, &e.value));
            }
        }
        None
    }
}

impl<K, V, S> KeyedStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|e| e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .map(|&k| Handle::new(k))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    pub fn insert(&mut self, key: K, value: V) -> Result<Handle, InsertError> {
        self.insert_with(key, || value)
    }

    /// Insert using a lazy value constructor; `default()` only runs when the
    /// key is vacant.
    pub fn insert_with<F>(&mut self, key: K, default: F) -> Result<Handle, InsertError>
    where
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(&key);
        match self.index.entry(
            hash,
            |&kk| self.slots.get(kk).map(|e| e.key == key).unwrap_or(false),
            |&kk| self.slots.get(kk).map(|e| e.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => Err(InsertError::DuplicateKey),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let value = default();
                let k = self.slots.insert(Entry { key, value, hash });
                let _ = v.insert(k);
                let handle = Handle::new(k);
                self.order.push(handle);
                Ok(handle)
            }
        }
    }

    pub fn get(&self, h: Handle) -> Option<(&K, &V)> {
        self.slots.get(h.raw_handle()).map(|e| (&e.key, &e.value))
    }

    pub fn value(&self, h: Handle) -> Option<&V> {
        self.get(h).map(|(_, v)| v)
    }

    pub fn remove(&mut self, handle: Handle) -> Option<(K, V)> {
        let k = handle.raw_handle();
        let entry = self.slots.remove(k)?;
        let _ = self
            .index
            .find_entry(entry.hash, |&kk| kk == k)
            .map(|occupied| occupied.remove());
        self.compact_order();
        Some((entry.key, entry.value))
    }

    pub fn remove_key<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find(q)?;
        self.remove(h)
    }

    /// Remove every entry and hand them back so the caller controls when
    /// they drop. Slot generations survive, so old handles stay stale.
    pub fn clear(&mut self) -> Vec<(K, V)> {
        self.index.clear();
        self.order.clear();
        self.slots.drain().map(|(_, e)| (e.key, e.value)).collect()
    }

    /// Clones of the live keys in insertion order.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.iter().map(|(_, k, _)| k.clone()).collect()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            order: self.order.iter(),
            slots: &self.slots,
        }
    }

    fn compact_order(&mut self) {
        if self.order.len() > 2 * self.slots.len() + 16 {
            let slots = &self.slots;
            self.order.retain(|h| slots.contains_key(h.raw_handle()));
        }
    }
}
