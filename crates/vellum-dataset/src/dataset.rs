// SPDX-License-Identifier: Apache-2.0
//! The dataset handle (§3, §4.D).

use tokio_util::sync::CancellationToken;
use vellum_chunkstore::ChunkStore;
use vellum_values::{Ref, Value};

use crate::commit::{read_commit, Commit};
use crate::error::DatasetError;

/// An immutable snapshot of "what the database said this dataset's head was
/// when I got it".
///
/// `Dataset` handles own nothing, are cheap to clone, and are never mutated in
/// place — advancing a dataset always produces a *new* handle (see
/// `crate::Database::commit`). A handle obtained before a race may lag behind
/// the dataset's true current head; that staleness is exactly what the commit
/// protocol's CAS detects (§4.F), not a bug in this type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dataset {
    name: String,
    head: Option<Ref<Commit>>,
}

impl Dataset {
    /// Construct a handle directly from an observed `(name, head)` pair.
    ///
    /// Exposed so a caller that receives
    /// [`DatasetError::ConcurrentUpdate`](crate::DatasetError::ConcurrentUpdate)'s
    /// `observed` head can build the `Dataset{name, head = observed}` handle
    /// §4.F step 4 describes and retry against it directly, without an extra
    /// `get_dataset` round trip.
    pub fn new(name: String, head: Option<Ref<Commit>>) -> Self {
        Self { name, head }
    }

    /// The dataset's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` if this handle observed a head commit.
    pub fn has_head(&self) -> bool {
        self.head.is_some()
    }

    /// The observed head commit's ref, if any.
    pub fn head_ref(&self) -> Option<Ref<Commit>> {
        self.head
    }

    /// The observed head commit, if any.
    pub fn maybe_head(
        &self,
        store: &dyn ChunkStore,
        cancel: &CancellationToken,
    ) -> Result<(Option<Commit>, bool), DatasetError> {
        match self.head {
            Some(r) => {
                let commit = read_commit(r, store, cancel)?;
                Ok((Some(commit), true))
            }
            None => Ok((None, false)),
        }
    }

    /// The observed head commit.
    ///
    /// # Panics
    ///
    /// Panics if this dataset has no head — per §4.H/§7 this is a programmer
    /// error (the caller should have checked [`Dataset::has_head`] or used
    /// [`Dataset::maybe_head`]), not a recoverable condition.
    #[allow(clippy::panic)]
    pub fn head(&self, store: &dyn ChunkStore, cancel: &CancellationToken) -> Commit {
        match self.maybe_head(store, cancel) {
            Ok((Some(commit), true)) => commit,
            Ok(_) => panic!(
                "Dataset::head called on dataset {:?} with no head; use maybe_head",
                self.name
            ),
            Err(e) => panic!("Dataset::head failed to read commit: {e}"),
        }
    }

    /// The observed head commit's payload value, if any.
    pub fn maybe_head_value(
        &self,
        store: &dyn ChunkStore,
        cancel: &CancellationToken,
    ) -> Result<(Option<Value>, bool), DatasetError> {
        let (commit, present) = self.maybe_head(store, cancel)?;
        match commit {
            Some(c) => {
                let value = vellum_values::read(c.value_ref(), store, cancel)?;
                Ok((Some(value), present))
            }
            None => Ok((None, false)),
        }
    }

    /// The observed head commit's payload value.
    ///
    /// # Panics
    ///
    /// Panics if this dataset has no head; see [`Dataset::head`].
    #[allow(clippy::panic)]
    pub fn head_value(&self, store: &dyn ChunkStore, cancel: &CancellationToken) -> Value {
        match self.maybe_head_value(store, cancel) {
            Ok((Some(value), true)) => value,
            Ok(_) => panic!(
                "Dataset::head_value called on dataset {:?} with no head; use maybe_head_value",
                self.name
            ),
            Err(e) => panic!("Dataset::head_value failed to read value: {e}"),
        }
    }
}
