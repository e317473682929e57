//! Error types surfaced by key derivation.

/// Raised when a value has a runtime type the codec cannot key.
///
/// Only insertion paths (`ValueSet::add` and the bulk constructors) return
/// this; lookups treat an unkeyable value as absent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("unsupported value type: {type_name}")]
    UnsupportedType { type_name: &'static str },
}
