// SPDX-License-Identifier: Apache-2.0
//! Content-addressed chunk store: the storage contract the rest of vellum is built on.
//!
//! `vellum-chunkstore` defines the [`ChunkStore`] trait — content-addressed blob
//! storage plus a single atomically-swapped root hash — and ships [`MemoryStore`],
//! an in-process reference implementation sufficient for embedding and for the
//! rest of the workspace's test suites. Disk and remote tiers are external
//! collaborators; only the contract they must satisfy lives here.
//!
//! # Hash Domain Policy
//!
//! Chunk hashes are content-only: `hash(bytes)` with no domain prefix. Two chunks
//! with identical bytes are the same chunk regardless of what layer above
//! interprets them. Domain separation (distinguishing a `Value` chunk from a
//! `Commit` chunk) happens at the typed-reference layer in `vellum-values`, not
//! here.
//!
//! # Determinism Invariant
//!
//! No public API exposes store iteration order. Any future `list`/`iter` API
//! must return results sorted by [`Hash`].
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

mod memory;
pub use memory::MemoryStore;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Width in bytes of every [`Hash`] value.
///
/// The hashing algorithm is implementation-defined beyond the fixed width; this
/// reference implementation truncates a `BLAKE3` digest to this length.
pub const HASH_LEN: usize = 20;

/// A fixed-width, opaque, equality-comparable content digest.
///
/// `Hash::ZERO` is the distinguished "no root" sentinel used by
/// [`ChunkStore::root`] for an empty store.
#[repr(transparent)]
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// The sentinel hash denoting "no root" / "no value".
    pub const ZERO: Hash = Hash([0u8; HASH_LEN]);

    /// View the hash as a byte slice.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Returns `true` if this is the zero sentinel.
    pub fn is_zero(&self) -> bool {
        *self == Hash::ZERO
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Compute the content hash of `bytes`.
///
/// No domain prefix — the content IS the identity. See module-level docs for
/// hash domain policy.
pub fn hash_bytes(bytes: &[u8]) -> Hash {
    let digest = blake3::hash(bytes);
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&digest.as_bytes()[..HASH_LEN]);
    Hash(out)
}

/// Errors that can occur during chunk store operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The supplied cancellation token was already tripped.
    #[error("operation canceled")]
    Canceled,

    /// The store was used after [`ChunkStore::close`].
    #[error("chunk store used after close")]
    Closed,

    /// Backend-specific failure (I/O, network, etc).
    ///
    /// The reference [`MemoryStore`] never produces this variant; it exists
    /// so out-of-process backends (disk, remote) have somewhere to surface
    /// their own failures without widening this enum per-backend.
    #[error("chunk store backend error: {cause}")]
    Backend {
        /// Human-readable cause, opaque to callers.
        cause: String,
    },
}

/// Content-addressed chunk store with a single CAS-guarded root hash.
///
/// Implementations store opaque byte blobs keyed by content hash and expose a
/// second, independent piece of state — the *root* — whose only legal mutation
/// is an atomic compare-and-swap. The root is how `vellum-dataset` persists the
/// current `DatasetMap` without any in-process lock: correctness rests entirely
/// on [`commit_root`](ChunkStore::commit_root).
///
/// Every operation takes a [`CancellationToken`] (see `tokio-util`): callers may
/// cancel between any two blocking steps, and implementations must check it at
/// entry and at natural suspension points.
///
/// # Absence Semantics
///
/// [`get`](ChunkStore::get) returns `Ok(None)` for missing chunks — this is
/// **not** an error. Error variants are reserved for cancellation, use-after-close,
/// and backend integrity failures.
pub trait ChunkStore: Send + Sync {
    /// Compute hash and store. Idempotent: repeated puts of the same bytes are
    /// a no-op and return the same hash.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Canceled`] if `cancel` is tripped, or
    /// [`StoreError::Closed`] if the store has been closed.
    fn put(&self, bytes: &[u8], cancel: &CancellationToken) -> Result<Hash, StoreError>;

    /// Retrieve a chunk by hash. Returns `Ok(None)` if not stored — absence is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Canceled`] or [`StoreError::Closed`].
    fn get(&self, hash: &Hash, cancel: &CancellationToken)
        -> Result<Option<Arc<[u8]>>, StoreError>;

    /// Current store root. [`Hash::ZERO`] means "empty store".
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Canceled`] or [`StoreError::Closed`].
    fn root(&self, cancel: &CancellationToken) -> Result<Hash, StoreError>;

    /// Atomically replace the root with `new`, iff it currently equals
    /// `expected`. Returns whether the swap occurred.
    ///
    /// All chunks transitively reachable from `new` must already have been
    /// [`put`](ChunkStore::put) before this is called.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Canceled`] or [`StoreError::Closed`].
    fn commit_root(
        &self,
        expected: Hash,
        new: Hash,
        cancel: &CancellationToken,
    ) -> Result<bool, StoreError>;

    /// Release this view. Subsequent operations must fail with
    /// [`StoreError::Closed`] rather than panic or silently succeed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if releasing underlying resources fails.
    fn close(&self) -> Result<(), StoreError>;
}

pub(crate) fn check_canceled(cancel: &CancellationToken) -> Result<(), StoreError> {
    if cancel.is_cancelled() {
        return Err(StoreError::Canceled);
    }
    Ok(())
}
