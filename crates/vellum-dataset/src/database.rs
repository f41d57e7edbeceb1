// SPDX-License-Identifier: Apache-2.0
//! The database: a chunk-store view plus dataset operations (§4.C).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::warn;
use vellum_chunkstore::{ChunkStore, Hash};
use vellum_values::{Ref, Value};

use crate::commit::Commit;
use crate::config::DatabaseOptions;
use crate::dataset::Dataset;
use crate::dataset_map::{read_dataset_map, write_dataset_map};
use crate::error::DatasetError;
use crate::name::is_valid_dataset_name;
use crate::protocol::{advance_dataset, CommitOptions};

/// Holds a view over a chunk store and exposes dataset operations.
///
/// Safe to share across threads: `get_dataset`/`datasets` are pure reads,
/// and `commit`/`delete` race safely against other `Database` handles over
/// the same chunk store because correctness rests entirely on the store's
/// root CAS, not on anything this struct holds locally. The cached
/// `DatasetMap` is purely an optimization to skip re-decoding an unchanged
/// root; it is never the source of truth.
pub struct Database {
    store: Arc<dyn ChunkStore>,
    options: DatabaseOptions,
    cache: Mutex<Option<(Hash, BTreeMap<String, Ref<Commit>>)>>,
    closed: AtomicBool,
}

impl Database {
    /// Open a database over `store` with `options`.
    pub fn new(store: Arc<dyn ChunkStore>, options: DatabaseOptions) -> Self {
        Self {
            store,
            options,
            cache: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Open a database over `store` with default options.
    pub fn open(store: Arc<dyn ChunkStore>) -> Self {
        Self::new(store, DatabaseOptions::default())
    }

    /// # Panics
    ///
    /// Panics if this database has been [`close`](Database::close)d — reuse
    /// after close is a programmer error (§4.H/§7), not a recoverable
    /// condition.
    #[allow(clippy::panic)]
    fn ensure_open(&self) {
        if self.closed.load(Ordering::Acquire) {
            panic!("Database used after close");
        }
    }

    fn current_map(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(Hash, BTreeMap<String, Ref<Commit>>), DatasetError> {
        let root = self.store.root(cancel)?;
        #[allow(clippy::unwrap_used)] // poisoning would mean a prior panic under our own lock
        let mut cache = self.cache.lock().unwrap();
        if let Some((cached_root, map)) = cache.as_ref() {
            if *cached_root == root {
                return Ok((root, map.clone()));
            }
        }
        let map = read_dataset_map(root, self.store.as_ref(), cancel)?;
        *cache = Some((root, map.clone()));
        Ok((root, map))
    }

    /// Look up `name` in the current `DatasetMap`.
    ///
    /// # Panics
    ///
    /// Panics if `name` fails [`is_valid_dataset_name`] — an invalid name is
    /// a programmer error (§4.H), distinct from the commit-conflict error
    /// channel.
    #[allow(clippy::panic)]
    pub fn get_dataset(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Dataset, DatasetError> {
        self.ensure_open();
        if !is_valid_dataset_name(name) {
            panic!("invalid dataset name: {name:?}");
        }
        let (_, map) = self.current_map(cancel)?;
        Ok(Dataset::new(name.to_string(), map.get(name).copied()))
    }

    /// Shorthand for `commit(ds, value, {parents = {ds.head_ref} if ds has
    /// head else {}}, CommitMeta::default())`.
    pub fn commit_value(
        &self,
        ds: &Dataset,
        value: &Value,
        cancel: &CancellationToken,
    ) -> Result<Dataset, DatasetError> {
        let parents = ds.head_ref().into_iter().collect();
        self.commit(
            ds,
            value,
            &CommitOptions { parents },
            crate::commit::CommitMeta::default(),
            cancel,
        )
    }

    /// Advance `ds`'s head to a new commit over `value` under `options`,
    /// recording `meta` as the new commit's author/message metadata.
    ///
    /// See [`crate::protocol::advance_dataset`] for the full CAS-loop
    /// contract.
    pub fn commit(
        &self,
        ds: &Dataset,
        value: &Value,
        options: &CommitOptions,
        meta: crate::commit::CommitMeta,
        cancel: &CancellationToken,
    ) -> Result<Dataset, DatasetError> {
        self.ensure_open();
        let advanced = advance_dataset(
            ds,
            value,
            options,
            meta,
            self.store.as_ref(),
            &self.options.retry,
            cancel,
        )?;
        self.invalidate_cache();
        Ok(advanced)
    }

    /// CAS-remove `ds.name` from the `DatasetMap`.
    ///
    /// Returns a headless `Dataset` for `ds.name` on success, or
    /// [`DatasetError::ConcurrentUpdate`] carrying the winning head if
    /// another writer raced ahead of `ds`.
    pub fn delete(&self, ds: &Dataset, cancel: &CancellationToken) -> Result<Dataset, DatasetError> {
        self.ensure_open();
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(DatasetError::Canceled);
            }
            let expected = self.store.root(cancel)?;
            let mut map = read_dataset_map(expected, self.store.as_ref(), cancel)?;
            let observed = map.get(ds.name()).copied();
            if observed != ds.head_ref() {
                warn!(dataset = ds.name(), "concurrent update conflict on delete");
                return Err(DatasetError::ConcurrentUpdate {
                    name: ds.name().to_string(),
                    observed,
                });
            }
            map.remove(ds.name());
            let new_root = write_dataset_map(&map, self.store.as_ref(), cancel)?;
            if self.store.commit_root(expected, new_root, cancel)? {
                self.invalidate_cache();
                return Ok(Dataset::new(ds.name().to_string(), None));
            }
            attempt += 1;
            if attempt >= self.options.retry.max_attempts {
                return Err(DatasetError::RetryExhausted {
                    name: ds.name().to_string(),
                    attempts: attempt,
                });
            }
        }
    }

    /// Snapshot enumeration of every dataset in the current `DatasetMap`, in
    /// name order. Pure read; same staleness posture as
    /// [`get_dataset`](Database::get_dataset).
    pub fn datasets(&self, cancel: &CancellationToken) -> Result<Vec<Dataset>, DatasetError> {
        self.ensure_open();
        let (_, map) = self.current_map(cancel)?;
        Ok(map
            .into_iter()
            .map(|(name, head)| Dataset::new(name, Some(head)))
            .collect())
    }

    /// Release the underlying chunk-store view. Operations after close
    /// panic (see [`ensure_open`](Database::ensure_open)).
    ///
    /// # Errors
    ///
    /// Forwards [`DatasetError::Backend`] if the store fails to release its
    /// resources.
    pub fn close(&self) -> Result<(), DatasetError> {
        self.store.close()?;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    /// Access to the underlying chunk store, for callers that need to read a
    /// [`Dataset`]'s head commit or value directly (e.g. the staged-commit
    /// composer).
    pub fn store(&self) -> &dyn ChunkStore {
        self.store.as_ref()
    }

    fn invalidate_cache(&self) {
        #[allow(clippy::unwrap_used)]
        let mut cache = self.cache.lock().unwrap();
        *cache = None;
    }
}
