//! Snapshot iterators over a `ValueSet`.
//!
//! A cursor captures the ordered keys of the members present when it is
//! created and holds only a weak back-reference to the set. Each step looks
//! the key up in live storage and skips keys that are no longer present. Keys
//! added later are outside the snapshot and are never visited; a snapshotted
//! key that was removed and added back before the cursor reached it is
//! visited. Once exhausted, the cursor drops its snapshot and back reference
//! and keeps returning `None`.

use crate::codec::Key;
use crate::value::Value;
use crate::value_set::SetInner;
use std::iter::FusedIterator;
use std::rc::Weak;

#[derive(Debug)]
enum Cursor {
    Active {
        snapshot: Vec<Key>,
        position: usize,
        owner: Weak<SetInner>,
    },
    Exhausted,
}

impl Cursor {
    fn new(owner: Weak<SetInner>, snapshot: Vec<Key>) -> Self {
        Cursor::Active {
            snapshot,
            position: 0,
            owner,
        }
    }

    fn advance(&mut self) -> Option<Value> {
        if let Cursor::Active {
            snapshot,
            position,
            owner,
        } = self
        {
            // A dropped set ends iteration.
            if let Some(inner) = owner.upgrade() {
                let store = inner.store.borrow();
                while let Some(key) = snapshot.get(*position) {
                    *position += 1;
                    if let Some(v) = store.find(key).and_then(|h| store.value(h)) {
                        return Some(v.clone());
                    }
                }
            }
        }
        *self = Cursor::Exhausted;
        None
    }

    fn remaining(&self) -> usize {
        match self {
            Cursor::Active {
                snapshot, position, ..
            } => snapshot.len() - position,
            Cursor::Exhausted => 0,
        }
    }

    fn is_exhausted(&self) -> bool {
        matches!(self, Cursor::Exhausted)
    }
}

/// Iterator over set members; `keys()` and `values()` both return it.
#[derive(Debug)]
pub struct Values {
    cursor: Cursor,
}

/// Sets have no separate keys; `keys()` is an alias of `values()`.
pub type Keys = Values;

impl Values {
    pub(crate) fn new(owner: Weak<SetInner>, snapshot: Vec<Key>) -> Self {
        Values {
            cursor: Cursor::new(owner, snapshot),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_exhausted()
    }
}

impl Iterator for Values {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.cursor.advance()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.cursor.remaining()))
    }
}

impl FusedIterator for Values {}

/// Iterator over `(value, value)` pairs.
#[derive(Debug)]
pub struct Entries {
    cursor: Cursor,
}

impl Entries {
    pub(crate) fn new(owner: Weak<SetInner>, snapshot: Vec<Key>) -> Self {
        Entries {
            cursor: Cursor::new(owner, snapshot),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_exhausted()
    }
}

impl Iterator for Entries {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<(Value, Value)> {
        self.cursor.advance().map(|v| (v.clone(), v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.cursor.remaining()))
    }
}

impl FusedIterator for Entries {}
