// SPDX-License-Identifier: Apache-2.0
//! Structured value model and canonical codec for vellum.
//!
//! `vellum-values` owns the [`Value`] sum type (§3 of the data model),
//! the typed/untyped reference types ([`Ref`], [`RawRef`]), and the codec
//! operations (`hash`, `write`, `read`, `equals`) that give values a stable,
//! construction-order-independent hash and let them round-trip through a
//! [`ChunkStore`](vellum_chunkstore::ChunkStore).
//!
//! The codec version is a single opaque [`FormatTag`] shared by every value in
//! a store (§4.B) — this crate ships exactly one format and does not attempt
//! forward/backward migration between formats; that is a caller concern.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions
)]

mod reference;
mod value;

pub use reference::{RawRef, Ref};
pub use value::Value;

use tokio_util::sync::CancellationToken;

use vellum_chunkstore::{ChunkStore, Hash, StoreError};

/// Opaque codec format-version identifier (§4.B).
///
/// Two values only compare equal under [`equals`] when interpreted under the
/// same format. This crate only ever produces [`FormatTag::CURRENT`]; the tag
/// exists so callers persisting a store long-term have somewhere to record
/// which codec generation wrote it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FormatTag(pub u32);

impl FormatTag {
    /// The only format this crate's codec currently produces or understands.
    pub const CURRENT: FormatTag = FormatTag(1);
}

/// Errors from codec operations.
#[derive(Debug, thiserror::Error)]
pub enum ValuesError {
    /// The underlying chunk store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A chunk was read but did not decode as a well-formed [`Value`].
    #[error("chunk {hash} did not decode as a value: {cause}")]
    Decode {
        /// The hash of the chunk that failed to decode.
        hash: Hash,
        /// Human-readable decode failure.
        cause: String,
    },

    /// The addressed chunk does not exist in the store.
    #[error("no chunk found for hash {hash}")]
    MissingChunk {
        /// The hash that was looked up.
        hash: Hash,
    },
}

/// Compute the content hash of a value under the current format.
///
/// # Errors
///
/// Returns [`ValuesError::Decode`]-shaped failure only in the (practically
/// unreachable) case that `value` cannot be canonically serialized.
pub fn hash(value: &Value) -> Result<Hash, ValuesError> {
    let bytes = value
        .canonical_bytes()
        .map_err(|e| ValuesError::Decode {
            hash: Hash::ZERO,
            cause: e.to_string(),
        })?;
    Ok(vellum_chunkstore::hash_bytes(&bytes))
}

/// Serialize `value` and `put` it into `store`, returning a typed [`Ref`] to it.
///
/// # Errors
///
/// Returns [`ValuesError::Store`] if the underlying `put` fails (including
/// cancellation), or a decode-shaped error if `value` cannot be serialized.
pub fn write(
    value: &Value,
    store: &dyn ChunkStore,
    cancel: &CancellationToken,
) -> Result<Ref<Value>, ValuesError> {
    let bytes = value
        .canonical_bytes()
        .map_err(|e| ValuesError::Decode {
            hash: Hash::ZERO,
            cause: e.to_string(),
        })?;
    let hash = store.put(&bytes, cancel)?;
    Ok(Ref::new(hash))
}

/// Read back the value addressed by `r`.
///
/// # Errors
///
/// Returns [`ValuesError::Store`] on backend failure or cancellation,
/// [`ValuesError::MissingChunk`] if the hash is not present, or
/// [`ValuesError::Decode`] if the bytes present are not a well-formed `Value`.
pub fn read(
    r: Ref<Value>,
    store: &dyn ChunkStore,
    cancel: &CancellationToken,
) -> Result<Value, ValuesError> {
    let hash = r.hash();
    let bytes = store
        .get(&hash, cancel)?
        .ok_or(ValuesError::MissingChunk { hash })?;
    ciborium::de::from_reader(bytes.as_ref()).map_err(|e| ValuesError::Decode {
        hash,
        cause: e.to_string(),
    })
}

/// Structural equality under a given format.
///
/// Two values from different formats are never equal, even if their
/// in-memory shapes happen to coincide — callers must not compare across
/// format boundaries.
pub fn equals(a: &Value, b: &Value, format: FormatTag) -> bool {
    format == FormatTag::CURRENT && a == b
}
