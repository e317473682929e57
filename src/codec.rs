//! KeyCodec: canonical, type-namespaced keys for values.
//!
//! Primitive keys are computed from the value alone. Reference values are
//! keyed by an `Identity` minted the first time they are inserted and kept
//! in a side table indexed by allocation address, so the caller's value is
//! never touched. Each entry holds a `Weak` to its allocation; an entry whose
//! target has been dropped is dead and is purged lazily.

use crate::error::CodecError;
use crate::value::{number_to_string, RefTarget, Value};
use hashbrown::HashMap;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

const IDENTITY_PREFIX: &str = "obj_";
const PURGE_FLOOR: usize = 64;

/// Identity minted for a reference value; unique within its codec.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Identity(u64);

impl Identity {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", IDENTITY_PREFIX, self.0)
    }
}

/// Storage key for a value. `Display` renders the canonical string form,
/// a three-letter type tag and the value (`num_1`, `str_1`, `nul_null`),
/// or the identity of a reference (`obj_7`).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Key {
    Undefined,
    Null,
    Bool(bool),
    /// Bit pattern of the number with `-0` folded into `0` and one NaN.
    Number(u64),
    String(Rc<str>),
    Reference(Identity),
}

impl Key {
    fn number(n: f64) -> Key {
        let canonical = if n.is_nan() {
            f64::NAN
        } else if n == 0.0 {
            0.0
        } else {
            n
        };
        Key::Number(canonical.to_bits())
    }

    fn primitive(value: &Value) -> Result<Key, CodecError> {
        match value {
            Value::Undefined => Ok(Key::Undefined),
            Value::Null => Ok(Key::Null),
            Value::Bool(b) => Ok(Key::Bool(*b)),
            Value::Number(n) => Ok(Key::number(*n)),
            Value::String(s) => Ok(Key::String(s.clone())),
            other => Err(CodecError::UnsupportedType {
                type_name: other.type_name(),
            }),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Undefined => f.write_str("und_undefined"),
            Key::Null => f.write_str("nul_null"),
            Key::Bool(b) => write!(f, "boo_{}", b),
            Key::Number(bits) => write!(f, "num_{}", number_to_string(f64::from_bits(*bits))),
            Key::String(s) => write!(f, "str_{}", s),
            Key::Reference(id) => id.fmt(f),
        }
    }
}

struct Tag {
    target: Weak<dyn Any>,
    identity: Identity,
}

/// Derives keys and owns the identity side table.
pub struct KeyCodec {
    next: Cell<u64>,
    tags: RefCell<HashMap<usize, Tag>>,
    purge_at: Cell<usize>,
}

thread_local! {
    static SHARED: Rc<KeyCodec> = Rc::new(KeyCodec::new());
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyCodec {
    pub fn new() -> Self {
        Self {
            next: Cell::new(0),
            tags: RefCell::new(HashMap::new()),
            purge_at: Cell::new(PURGE_FLOOR),
        }
    }

    /// The per-thread codec used by `ValueSet::new`. Every set built on it
    /// sees the same identity for the same reference.
    pub fn shared() -> Rc<KeyCodec> {
        SHARED.with(Rc::clone)
    }

    /// Key for `value`. A reference without an identity yields `Ok(None)`
    /// unless `create_if_absent` is set, in which case one is minted.
    pub fn derive_key(
        &self,
        value: &Value,
        create_if_absent: bool,
    ) -> Result<Option<Key>, CodecError> {
        if create_if_absent {
            self.key_for_insert(value).map(Some)
        } else {
            self.key_for_lookup(value)
        }
    }

    pub fn key_for_insert(&self, value: &Value) -> Result<Key, CodecError> {
        match value.downgrade() {
            Some(target) => Ok(Key::Reference(self.tag(target))),
            None => Key::primitive(value),
        }
    }

    pub fn key_for_lookup(&self, value: &Value) -> Result<Option<Key>, CodecError> {
        match value.downgrade() {
            Some(target) => Ok(self.lookup(&target).map(Key::Reference)),
            None => Key::primitive(value).map(Some),
        }
    }

    /// Number of tagged references that are still alive.
    pub fn tracked(&self) -> usize {
        self.tags
            .borrow()
            .values()
            .filter(|t| t.target.strong_count() > 0)
            .count()
    }

    fn lookup(&self, target: &RefTarget) -> Option<Identity> {
        let tags = self.tags.borrow();
        let tag = tags.get(&target.addr)?;
        // A live tag pins its allocation, so the address cannot name another value.
        (tag.target.strong_count() > 0).then_some(tag.identity)
    }

    fn tag(&self, target: RefTarget) -> Identity {
        if let Some(identity) = self.lookup(&target) {
            return identity;
        }
        let identity = Identity(self.next.get());
        self.next.set(identity.0 + 1);

        let mut tags = self.tags.borrow_mut();
        tags.insert(
            target.addr,
            Tag {
                target: target.weak,
                identity,
            },
        );
        tracing::trace!(%identity, "minted reference identity");

        if tags.len() >= self.purge_at.get() {
            tags.retain(|_, t| t.target.strong_count() > 0);
            let live = tags.len();
            self.purge_at.set((live * 2).max(PURGE_FLOOR));
            tracing::trace!(live, "purged dead identity tags");
        }
        identity
    }
}

impl fmt::Debug for KeyCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCodec")
            .field("next", &self.next.get())
            .field("tags", &self.tags.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ArrayRef, FunctionRef, ObjectRef, Symbol};

    fn key(codec: &KeyCodec, v: impl Into<Value>) -> String {
        codec.key_for_insert(&v.into()).unwrap().to_string()
    }

    /// Invariant: primitive keys carry a type namespace, so `1` and `"1"` differ.
    #[test]
    fn primitive_keys_are_type_namespaced() {
        let c = KeyCodec::new();
        assert_eq!(key(&c, 1), "num_1");
        assert_eq!(key(&c, "1"), "str_1");
        assert_eq!(key(&c, true), "boo_true");
        assert_eq!(key(&c, 3.414), "num_3.414");
        assert_eq!(key(&c, Value::Null), "nul_null");
        assert_eq!(key(&c, Value::Undefined), "und_undefined");
        assert_eq!(key(&c, "null"), "str_null");
        assert_ne!(
            c.key_for_insert(&Value::from(1)).unwrap(),
            c.key_for_insert(&Value::from("1")).unwrap()
        );
    }

    /// Invariant: numbers share a key exactly when their string forms match.
    #[test]
    fn number_keys_fold_signed_zero_and_nan() {
        let c = KeyCodec::new();
        assert_eq!(key(&c, -0.0), key(&c, 0.0));
        assert_eq!(key(&c, f64::NAN), "num_NaN");
        assert_eq!(
            c.key_for_insert(&Value::from(f64::NAN)).unwrap(),
            c.key_for_insert(&Value::from(-f64::NAN)).unwrap()
        );
        assert_ne!(key(&c, f64::INFINITY), key(&c, f64::NEG_INFINITY));
        assert_ne!(key(&c, 0.1 + 0.2), key(&c, 0.3));
        assert_eq!(key(&c, 1e21), "num_1e+21");
        assert_eq!(key(&c, 1e-7), "num_1e-7");
    }

    /// Invariant: lookup never mints; insert mints once and reuses it afterwards.
    #[test]
    fn reference_identity_is_minted_once() {
        let c = KeyCodec::new();
        let obj = Value::from(ObjectRef::new());
        assert_eq!(c.derive_key(&obj, false).unwrap(), None);
        assert_eq!(c.tracked(), 0);

        let first = c.derive_key(&obj, true).unwrap().unwrap();
        assert_eq!(first.to_string(), "obj_0");
        assert_eq!(c.derive_key(&obj, true).unwrap(), Some(first.clone()));
        assert_eq!(c.derive_key(&obj, false).unwrap(), Some(first));
        assert_eq!(c.tracked(), 1);
    }

    /// Invariant: distinct references get distinct keys even when structurally equal.
    #[test]
    fn structurally_equal_references_differ() {
        let c = KeyCodec::new();
        let a = ObjectRef::new().with("name", "hello");
        let b = ObjectRef::new().with("name", "hello");
        let f1 = FunctionRef::new("f", 0, |_, _| Value::Undefined);
        let f2 = FunctionRef::new("f", 0, |_, _| Value::Undefined);
        let keys = [
            key(&c, a.clone()),
            key(&c, b),
            key(&c, f1),
            key(&c, f2),
            key(&c, ArrayRef::default()),
        ];
        for (i, k) in keys.iter().enumerate() {
            for other in &keys[i + 1..] {
                assert_ne!(k, other);
            }
        }
        // Clones of a handle are the same reference.
        assert_eq!(key(&c, a.clone()), keys[0]);
        assert!(a.get("__objectPolyFillID").is_none(), "value must not be tagged");
    }

    #[test]
    fn symbols_are_rejected() {
        let c = KeyCodec::new();
        let sym = Value::from(Symbol::new("s"));
        let expected = CodecError::UnsupportedType {
            type_name: "symbol",
        };
        assert_eq!(c.derive_key(&sym, true), Err(expected.clone()));
        assert_eq!(c.derive_key(&sym, false), Err(expected));
    }

    /// Invariant: tags of dropped references are purged and never resolve again.
    #[test]
    fn dead_tags_are_purged() {
        let c = KeyCodec::new();
        let keep = Value::from(ObjectRef::new());
        let kept = c.key_for_insert(&keep).unwrap();
        for _ in 0..200 {
            let tmp = Value::from(ObjectRef::new());
            let _ = c.key_for_insert(&tmp).unwrap();
        }
        assert_eq!(c.tracked(), 1);
        assert!(c.tags.borrow().len() < 200);
        assert_eq!(c.key_for_lookup(&keep).unwrap(), Some(kept));
    }

    /// Invariant: identities from separate codecs are independent.
    #[test]
    fn codecs_are_isolated() {
        let c1 = KeyCodec::new();
        let c2 = KeyCodec::new();
        let obj = Value::from(ObjectRef::new());
        let _ = c1.key_for_insert(&Value::from(ObjectRef::new())).unwrap();
        let k1 = c1.key_for_insert(&obj).unwrap();
        assert_eq!(c2.key_for_lookup(&obj).unwrap(), None);
        let k2 = c2.key_for_insert(&obj).unwrap();
        assert_eq!(k1.to_string(), "obj_1");
        assert_eq!(k2.to_string(), "obj_0");
    }

    #[test]
    fn shared_codec_is_per_thread_singleton() {
        assert!(Rc::ptr_eq(&KeyCodec::shared(), &KeyCodec::shared()));
    }
}
