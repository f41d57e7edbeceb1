// SPDX-License-Identifier: Apache-2.0
//! Typed and untyped pointers-by-hash.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use vellum_chunkstore::Hash;

/// An untyped pointer-by-hash, as stored inside a [`crate::Value::Ref`] or
/// [`crate::Value::Set`]/[`crate::Value::Map`] variant.
///
/// `RawRef` carries no Rust-level type information — it is exactly
/// `(target-hash,)` per §3 of the data model. [`Ref<T>`] layers a phantom type over
/// this for API-level type safety; the wire/hash representation is identical
/// either way.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRef(pub Hash);

impl fmt::Display for RawRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed pointer-by-hash: `(target-hash, target-type)`.
///
/// The target type `T` is tracked only at the Rust-type level via
/// [`PhantomData`] — it is never serialized. This mirrors the `NodeId`/`TypeId`
/// newtype-over-hash pattern used for identifiers throughout this codebase:
/// a thin, `Copy`, zero-cost wrapper that prevents mixing up references to
/// different target types (a `Ref<Commit>` cannot be passed where a
/// `Ref<Value>` is expected) without adding any runtime representation beyond
/// the bare hash.
pub struct Ref<T> {
    hash: Hash,
    target: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    /// Construct a typed ref from a raw hash. Callers are responsible for the
    /// hash actually addressing a value of type `T`; this constructor performs
    /// no verification (`Ref<T>` is an address, not a guarantee).
    pub fn new(hash: Hash) -> Self {
        Self {
            hash,
            target: PhantomData,
        }
    }

    /// The addressed hash.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Erase the target type, yielding the untyped [`RawRef`] used inside
    /// [`crate::Value`] containers.
    pub fn to_raw(self) -> RawRef {
        RawRef(self.hash)
    }

    /// Reconstruct a typed ref from an untyped one. The caller asserts that
    /// the addressed chunk actually decodes as a `T`.
    pub fn from_raw(raw: RawRef) -> Self {
        Self::new(raw.0)
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ref<T> {}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl<T> Eq for Ref<T> {}

impl<T> PartialOrd for Ref<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ref<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl<T> std::hash::Hash for Ref<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ref").field(&self.hash).finish()
    }
}

impl<T> fmt::Display for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MarkerA;
    struct MarkerB;

    #[test]
    fn raw_round_trip_preserves_hash() {
        let h = Hash([7u8; vellum_chunkstore::HASH_LEN]);
        let typed: Ref<MarkerA> = Ref::new(h);
        let raw = typed.to_raw();
        assert_eq!(raw.0, h);
        let back: Ref<MarkerA> = Ref::from_raw(raw);
        assert_eq!(back.hash(), h);
    }

    #[test]
    fn equality_is_hash_only_not_phantom_type() {
        let h = Hash([9u8; vellum_chunkstore::HASH_LEN]);
        let a: Ref<MarkerA> = Ref::new(h);
        let b: Ref<MarkerB> = Ref::new(h);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn ordering_matches_hash_ordering() {
        let lo: Ref<MarkerA> = Ref::new(Hash([1u8; vellum_chunkstore::HASH_LEN]));
        let hi: Ref<MarkerA> = Ref::new(Hash([2u8; vellum_chunkstore::HASH_LEN]));
        assert!(lo < hi);
    }
}
