//! ValueSet: an unordered collection of unique values with live iteration.
//!
//! `ValueSet` is a cheap-clone handle; clones share one container, the way a
//! reference value would. Membership is decided by `Key`s from the set's
//! `KeyCodec`. Storage borrows are never held across calls into user code,
//! so visitors may add, delete, or clear while a `for_each` is running.

use crate::codec::{Key, KeyCodec};
use crate::error::CodecError;
use crate::iter::{Entries, Keys, Values};
use crate::store::{InsertError, KeyedStore};
use crate::value::{erase, ArrayLike, RefTarget, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub(crate) struct SetInner {
    pub(crate) store: RefCell<KeyedStore<Key, Value>>,
    codec: Rc<KeyCodec>,
}

#[derive(Clone)]
pub struct ValueSet {
    inner: Rc<SetInner>,
}

/// The container's method set. `remove` is accepted as a spelling of `delete`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SetMethod {
    Add,
    Delete,
    Has,
    Clear,
    ForEach,
    Keys,
    Values,
    Entries,
}

impl SetMethod {
    pub const ALL: [SetMethod; 8] = [
        SetMethod::Add,
        SetMethod::Delete,
        SetMethod::Has,
        SetMethod::Clear,
        SetMethod::ForEach,
        SetMethod::Keys,
        SetMethod::Values,
        SetMethod::Entries,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SetMethod::Add => "add",
            SetMethod::Delete => "delete",
            SetMethod::Has => "has",
            SetMethod::Clear => "clear",
            SetMethod::ForEach => "forEach",
            SetMethod::Keys => "keys",
            SetMethod::Values => "values",
            SetMethod::Entries => "entries",
        }
    }

    /// Expected argument count. Optional arguments are not counted, so
    /// `forEach` reports 1 although it also takes a bound context.
    pub fn arity(self) -> usize {
        match self {
            SetMethod::Add | SetMethod::Delete | SetMethod::Has | SetMethod::ForEach => 1,
            SetMethod::Clear | SetMethod::Keys | SetMethod::Values | SetMethod::Entries => 0,
        }
    }

    pub fn from_name(name: &str) -> Option<SetMethod> {
        if name == "remove" {
            return Some(SetMethod::Delete);
        }
        SetMethod::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl Default for ValueSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueSet {
    /// Empty set keyed by the per-thread shared codec.
    pub fn new() -> Self {
        Self::with_codec(KeyCodec::shared())
    }

    /// Empty set keyed by `codec`. Sets on different codecs assign
    /// independent identities to the same reference.
    pub fn with_codec(codec: Rc<KeyCodec>) -> Self {
        Self {
            inner: Rc::new(SetInner {
                store: RefCell::new(KeyedStore::new()),
                codec,
            }),
        }
    }

    /// Build from an array-like source, adding positions `0..length` in order.
    pub fn from_array_like<A>(source: &A) -> Result<Self, CodecError>
    where
        A: ArrayLike + ?Sized,
    {
        let set = Self::new();
        set.extend_from_array_like(source)?;
        tracing::debug!(size = set.size(), "built set from array-like");
        Ok(set)
    }

    /// Build from a dynamic value: nothing for `undefined`/`null`, elements of
    /// arrays and array-like objects, members of another set. Any other value
    /// contributes nothing.
    pub fn from_value(source: &Value) -> Result<Self, CodecError> {
        let set = Self::new();
        match source {
            Value::Array(a) => set.extend_from_array_like(a)?,
            Value::Object(o) => set.extend_from_array_like(o)?,
            Value::Set(other) => set.try_extend(other.values())?,
            _ => {}
        }
        tracing::debug!(
            size = set.size(),
            source = source.type_name(),
            "built set from value"
        );
        Ok(set)
    }

    pub fn try_from_iter<I>(iter: I) -> Result<Self, CodecError>
    where
        I: IntoIterator<Item = Value>,
    {
        let set = Self::new();
        set.try_extend(iter)?;
        Ok(set)
    }

    /// Add each value in order; stops at the first unkeyable value, keeping
    /// whatever was added before it.
    pub fn try_extend<I>(&self, iter: I) -> Result<(), CodecError>
    where
        I: IntoIterator<Item = Value>,
    {
        for value in iter {
            self.add(value)?;
        }
        Ok(())
    }

    fn extend_from_array_like<A>(&self, source: &A) -> Result<(), CodecError>
    where
        A: ArrayLike + ?Sized,
    {
        for i in 0..source.length() {
            self.add(source.item(i))?;
        }
        Ok(())
    }

    pub fn codec(&self) -> &Rc<KeyCodec> {
        &self.inner.codec
    }

    pub fn size(&self) -> usize {
        self.inner.store.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.borrow().is_empty()
    }

    /// Insert `value` unless an equal member is present; the stored member is
    /// kept on a repeat add. Returns the set for chaining.
    pub fn add(&self, value: Value) -> Result<&Self, CodecError> {
        let key = self.inner.codec.key_for_insert(&value)?;
        let mut pending = Some(value);
        let mut store = self.inner.store.borrow_mut();
        match store.insert_with(key, || pending.take().unwrap_or_default()) {
            Ok(h) => {
                if let Some((key, _)) = store.get(h) {
                    tracing::trace!(%key, "insert member");
                }
            }
            Err(InsertError::DuplicateKey) => {}
        }
        drop(store);
        // A rejected duplicate drops here, outside the borrow.
        drop(pending);
        Ok(self)
    }

    /// Membership test. Untracked references and unkeyable values are absent.
    pub fn has(&self, value: &Value) -> bool {
        match self.inner.codec.key_for_lookup(value) {
            Ok(Some(key)) => self.inner.store.borrow().contains_key(&key),
            _ => false,
        }
    }

    /// Remove `value`; `true` if it was a member.
    pub fn delete(&self, value: &Value) -> bool {
        let Ok(Some(key)) = self.inner.codec.key_for_lookup(value) else {
            return false;
        };
        let removed = self.inner.store.borrow_mut().remove_key(&key);
        match removed {
            Some((key, _member)) => {
                tracing::trace!(%key, "remove member");
                true
            }
            None => false,
        }
    }

    /// Alias of [`ValueSet::delete`].
    pub fn remove(&self, value: &Value) -> bool {
        self.delete(value)
    }

    /// Drop every member. Identities already minted for references stay with
    /// the codec, so re-adding a value reproduces its key.
    pub fn clear(&self) {
        let drained = self.inner.store.borrow_mut().clear();
        tracing::debug!(removed = drained.len(), "cleared set");
        drop(drained);
    }

    /// Call `visitor(value, value, set)` for each member present when the call
    /// starts, in insertion order.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&Value, &Value, &ValueSet),
    {
        for value in self.values() {
            visitor(&value, &value, self);
        }
    }

    /// Dynamic form of [`ValueSet::for_each`]: calls `visitor` with `this_arg`
    /// and arguments `[value, value, set]`. A non-function visitor is ignored.
    pub fn for_each_value(&self, visitor: &Value, this_arg: &Value) {
        let Some(f) = visitor.as_function() else {
            return;
        };
        let container = Value::Set(self.clone());
        for value in self.values() {
            let _ = f.call(this_arg, &[value.clone(), value, container.clone()]);
        }
    }

    pub fn keys(&self) -> Keys {
        self.values()
    }

    pub fn values(&self) -> Values {
        Values::new(Rc::downgrade(&self.inner), self.snapshot())
    }

    pub fn entries(&self) -> Entries {
        Entries::new(Rc::downgrade(&self.inner), self.snapshot())
    }

    /// Whether both handles refer to the same container.
    pub fn ptr_eq(&self, other: &ValueSet) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn snapshot(&self) -> Vec<Key> {
        self.inner.store.borrow().keys()
    }

    pub(crate) fn downgrade_erased(&self) -> RefTarget {
        erase(&self.inner)
    }
}

impl<'a> IntoIterator for &'a ValueSet {
    type Item = Value;
    type IntoIter = Values;

    fn into_iter(self) -> Values {
        self.values()
    }
}

impl fmt::Debug for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.inner.store.borrow();
        f.debug_set()
            .entries(store.iter().map(|(_, _, v)| v))
            .finish()
    }
}
