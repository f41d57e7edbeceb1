// SPDX-License-Identifier: Apache-2.0
//! In-memory chunk store.
//!
//! [`MemoryStore`] is the reference [`ChunkStore`] implementation — sufficient
//! for embedding and for exercising `vellum-dataset` end to end without an
//! external backend. Disk and remote tiers are out of scope for this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::{check_canceled, hash_bytes, ChunkStore, Hash, StoreError};

/// In-memory content-addressed chunk store.
///
/// Stores chunks in a `HashMap<Hash, Arc<[u8]>>` guarded by a [`Mutex`] and a
/// separately-guarded root hash. The two locks are never held together across
/// a suspension point: the root CAS is the sole commit point, so a caller
/// can observe an up-to-date root without the
/// blob map (or vice versa), but [`commit_root`](MemoryStore::commit_root)
/// itself is atomic with respect to other callers of `commit_root`.
pub struct MemoryStore {
    blobs: Mutex<HashMap<Hash, Arc<[u8]>>>,
    root: Mutex<Hash>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store with no root installed ([`Hash::ZERO`]).
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            root: Mutex::new(Hash::ZERO),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of distinct chunks currently stored.
    pub fn len(&self) -> usize {
        #[allow(clippy::unwrap_used)] // poisoning would mean a prior panic under our own lock
        self.blobs.lock().unwrap().len()
    }

    /// Returns `true` if no chunks are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore for MemoryStore {
    fn put(&self, bytes: &[u8], cancel: &CancellationToken) -> Result<Hash, StoreError> {
        self.ensure_open()?;
        check_canceled(cancel)?;
        let hash = hash_bytes(bytes);
        #[allow(clippy::unwrap_used)]
        let mut blobs = self.blobs.lock().unwrap();
        blobs.entry(hash).or_insert_with(|| Arc::from(bytes));
        trace!(%hash, len = bytes.len(), "chunk put");
        Ok(hash)
    }

    fn get(
        &self,
        hash: &Hash,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<[u8]>>, StoreError> {
        self.ensure_open()?;
        check_canceled(cancel)?;
        #[allow(clippy::unwrap_used)]
        let blobs = self.blobs.lock().unwrap();
        Ok(blobs.get(hash).cloned())
    }

    fn root(&self, cancel: &CancellationToken) -> Result<Hash, StoreError> {
        self.ensure_open()?;
        check_canceled(cancel)?;
        #[allow(clippy::unwrap_used)]
        let root = self.root.lock().unwrap();
        Ok(*root)
    }

    fn commit_root(
        &self,
        expected: Hash,
        new: Hash,
        cancel: &CancellationToken,
    ) -> Result<bool, StoreError> {
        self.ensure_open()?;
        check_canceled(cancel)?;
        #[allow(clippy::unwrap_used)]
        let mut root = self.root.lock().unwrap();
        if *root != expected {
            trace!(%expected, current = %*root, "commit_root CAS miss");
            return Ok(false);
        }
        *root = new;
        trace!(%new, "commit_root CAS installed");
        Ok(true)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::HASH_LEN;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[test]
    fn put_get_round_trip() {
        let store = MemoryStore::new();
        let t = token();
        let data = b"hello vellum";
        let hash = store.put(data, &t).unwrap();
        let got = store.get(&hash, &t).unwrap();
        assert_eq!(got.as_deref(), Some(data.as_slice()));
    }

    #[test]
    fn put_idempotence() {
        let store = MemoryStore::new();
        let t = token();
        let h1 = store.put(b"duplicate", &t).unwrap();
        let h2 = store.put(b"duplicate", &t).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_missing_returns_none() {
        let store = MemoryStore::new();
        let t = token();
        let hash = Hash([0xBB; HASH_LEN]);
        assert!(store.get(&hash, &t).unwrap().is_none());
    }

    #[test]
    fn empty_store_root_is_zero() {
        let store = MemoryStore::new();
        let t = token();
        assert_eq!(store.root(&t).unwrap(), Hash::ZERO);
        assert!(store.root(&t).unwrap().is_zero());
    }

    #[test]
    fn commit_root_cas_succeeds_on_match() {
        let store = MemoryStore::new();
        let t = token();
        let new_root = hash_bytes(b"root-v1");
        let ok = store.commit_root(Hash::ZERO, new_root, &t).unwrap();
        assert!(ok);
        assert_eq!(store.root(&t).unwrap(), new_root);
    }

    #[test]
    fn commit_root_cas_fails_on_stale_expected() {
        let store = MemoryStore::new();
        let t = token();
        let root_v1 = hash_bytes(b"root-v1");
        assert!(store.commit_root(Hash::ZERO, root_v1, &t).unwrap());

        // Someone else's expected value is now stale.
        let root_v2 = hash_bytes(b"root-v2");
        let ok = store.commit_root(Hash::ZERO, root_v2, &t).unwrap();
        assert!(!ok);
        assert_eq!(store.root(&t).unwrap(), root_v1);
    }

    #[test]
    fn canceled_token_short_circuits_every_op() {
        let store = MemoryStore::new();
        let t = token();
        t.cancel();
        assert!(matches!(
            store.put(b"x", &t).unwrap_err(),
            StoreError::Canceled
        ));
        assert!(matches!(
            store.get(&Hash::ZERO, &t).unwrap_err(),
            StoreError::Canceled
        ));
        assert!(matches!(
            store.root(&t).unwrap_err(),
            StoreError::Canceled
        ));
        assert!(matches!(
            store.commit_root(Hash::ZERO, Hash::ZERO, &t).unwrap_err(),
            StoreError::Canceled
        ));
    }

    #[test]
    fn closed_store_rejects_every_op() {
        let store = MemoryStore::new();
        let t = token();
        store.close().unwrap();
        assert!(matches!(store.put(b"x", &t).unwrap_err(), StoreError::Closed));
        assert!(matches!(
            store.get(&Hash::ZERO, &t).unwrap_err(),
            StoreError::Closed
        ));
        assert!(matches!(store.root(&t).unwrap_err(), StoreError::Closed));
        assert!(matches!(
            store.commit_root(Hash::ZERO, Hash::ZERO, &t).unwrap_err(),
            StoreError::Closed
        ));
    }

    #[test]
    fn large_blob_round_trip() {
        let store = MemoryStore::new();
        let t = token();
        let big = vec![0x42u8; 4 * 1024 * 1024];
        let hash = store.put(&big, &t).unwrap();
        let got = store.get(&hash, &t).unwrap().unwrap();
        assert_eq!(got.len(), big.len());
        assert_eq!(hash, hash_bytes(&big));
    }
}
