//! polyset: a single-threaded set of mixed primitive and reference values
//! with snapshot iteration that tolerates mutation.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a set that holds numbers, strings, booleans, null, undefined and
//!   reference values side by side, never confusing `1` with `"1"` and never
//!   confusing two structurally equal objects.
//! - Layers:
//!   - KeyCodec: maps each value to a `Key`. Primitives get a type-namespaced
//!     key; references get an `Identity` minted on first insertion and kept
//!     in an identity side table.
//!   - KeyedStore<K, V, S>: structural storage with stable generational
//!     handles and an insertion-order log.
//!   - ValueSet: public container built on the two layers above; owns the
//!     store and hands out snapshot iterators.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (built on `Rc`/`RefCell`).
//! - `size` always equals the number of live entries; only the container's
//!   own mutation paths change it.
//! - The caller's values are never mutated; identities live in the codec.
//!
//! Identity scope
//! - `ValueSet::new` uses a per-thread shared codec, so one object has the
//!   same identity in every set on that thread. `ValueSet::with_codec`
//!   scopes identities to the sets sharing the given codec.
//! - Identity tags hold `Weak` references. A tag outlives removal from a set
//!   but not the value itself; dead tags are purged lazily.
//!
//! Iteration under mutation
//! - Iterators capture the ordered keys present at creation plus a weak
//!   back-reference to the set. Each key is looked up again when reached:
//!   absent keys are skipped, keys added later are not visited, and a
//!   dropped set ends iteration.
//! - No storage borrow is held while user code runs (visitors, drops of
//!   removed members), so re-entrant mutation is allowed everywhere.
//!
//! Errors
//! - Only insertion can fail (`CodecError::UnsupportedType`, for symbols).
//!   Lookups and removals are total and report unkeyable values as absent.

mod codec;
pub mod conformance;
mod error;
mod iter;
#[cfg(feature = "bench_internal")]
pub mod store;
#[cfg(not(feature = "bench_internal"))]
mod store;
#[cfg(test)]
mod store_proptest;
mod value;
mod value_set;

// Public surface
pub use codec::{Identity, Key, KeyCodec};
pub use error::CodecError;
pub use iter::{Entries, Keys, Values};
pub use value::{ArrayLike, ArrayRef, FunctionRef, ObjectRef, Symbol, Value};
pub use value_set::{SetMethod, ValueSet};
