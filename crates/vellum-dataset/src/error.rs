// SPDX-License-Identifier: Apache-2.0
//! Recoverable error taxonomy (§6, §7).
//!
//! Programmer errors — an invalid dataset name, reading a head that does not
//! exist, or reusing a closed [`crate::Database`] — are not represented here.
//! Per §4.H/§7 they are unrecoverable contract violations and are raised as
//! panics at the call site that holds the broken precondition, never silently
//! folded into a `Result` a caller might paper over.

use vellum_chunkstore::StoreError;
use vellum_values::{Ref, ValuesError};

use crate::commit::Commit;

/// Recoverable errors from dataset and commit-protocol operations.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// Another writer's commit won the most recent root CAS. `observed`
    /// carries the winning head exactly as §4.F step 4 specifies
    /// (`Dataset{name, head = observed}`), so a caller can build a fresh
    /// [`crate::Dataset`] from it and retry without a separate
    /// `get_dataset` round trip.
    #[error("concurrent update to dataset {name:?}: observed head has moved")]
    ConcurrentUpdate {
        /// The dataset name that was being advanced.
        name: String,
        /// The head actually installed in the `DatasetMap`, if any, at the
        /// moment the CAS was attempted.
        observed: Option<Ref<Commit>>,
    },

    /// The CAS loop exhausted its configured retry ceiling without
    /// installing a new root.
    #[error("retry budget exhausted advancing dataset {name:?} after {attempts} attempts")]
    RetryExhausted {
        /// The dataset name that was being advanced.
        name: String,
        /// Number of CAS attempts made.
        attempts: u32,
    },

    /// §4.I step 2: the staged root equals the branch head, no merge is in
    /// progress, and `allow_empty` was false.
    #[error("nothing to commit")]
    NothingToCommit,

    /// §4.I step 1: an empty commit message was supplied.
    #[error("commit message must not be empty")]
    EmptyMessage,

    /// §4.I step 3: a merge is in progress but conflicts remain unresolved.
    #[error("cannot commit: {count} table(s) still in conflict")]
    MergeHasConflicts {
        /// Number of tables still recorded as conflicting.
        count: usize,
    },

    /// §4.I step 4: the caller-supplied foreign-key check rejected the
    /// staged root.
    #[error("foreign key violation: {cause}")]
    ForeignKeyViolation {
        /// The check's own failure description.
        cause: String,
    },

    /// The supplied [`tokio_util::sync::CancellationToken`] was tripped
    /// mid-operation.
    #[error("operation canceled")]
    Canceled,

    /// The chunk store or value codec failed for reasons unrelated to
    /// contention (I/O, decode failure, etc).
    #[error("backend error: {cause}")]
    Backend {
        /// Opaque cause, forwarded from the chunk store or codec.
        cause: String,
    },
}

impl From<StoreError> for DatasetError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Canceled => DatasetError::Canceled,
            other => DatasetError::Backend {
                cause: other.to_string(),
            },
        }
    }
}

impl From<ValuesError> for DatasetError {
    fn from(err: ValuesError) -> Self {
        match err {
            ValuesError::Store(StoreError::Canceled) => DatasetError::Canceled,
            other => DatasetError::Backend {
                cause: other.to_string(),
            },
        }
    }
}
