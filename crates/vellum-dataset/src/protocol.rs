// SPDX-License-Identifier: Apache-2.0
//! The commit protocol: the CAS loop that advances a dataset head (§4.F).

use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vellum_chunkstore::ChunkStore;
use vellum_values::{Ref, Value};

use crate::commit::{read_commit, write_commit, Commit, CommitMeta};
use crate::dataset::Dataset;
use crate::dataset_map::{read_dataset_map, write_dataset_map};
use crate::error::DatasetError;
use crate::history::is_ancestor;

/// Inputs to [`advance_dataset`] beyond the target dataset and payload value.
#[derive(Clone, Debug, Default)]
pub struct CommitOptions {
    /// The parent commits of the commit being created.
    pub parents: BTreeSet<Ref<Commit>>,
}

/// CAS retry policy for [`advance_dataset`] (§5 "CAS retry budget").
#[derive(Clone, Copy, Debug)]
pub struct RetryConfig {
    /// Maximum number of CAS attempts before surfacing
    /// [`DatasetError::RetryExhausted`].
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_base: Duration,
    /// Ceiling on the backoff delay.
    pub backoff_cap: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(50),
        }
    }
}

impl RetryConfig {
    fn backoff_for(&self, attempt: u32) -> Duration {
        let scaled = self.backoff_base.saturating_mul(1u32 << attempt.min(16));
        scaled.min(self.backoff_cap)
    }
}

/// Advance `ds.name`'s head from `ds.head_ref()` to a freshly written commit
/// whose payload is `value` and whose parent set is `options.parents`.
///
/// Implements the CAS loop of §4.F exactly: the commit chunk is durable
/// before any CAS attempt (so a losing writer never loses its commit, only
/// the race to install it as the visible head), and a `ConcurrentUpdateError`
/// carries a fresh [`Dataset`] reflecting the winning head so a retry is a
/// trivial re-call.
///
/// # Errors
///
/// - [`DatasetError::ConcurrentUpdate`] if another writer's commit won the
///   most recent root CAS.
/// - [`DatasetError::RetryExhausted`] if `retry.max_attempts` CAS attempts all
///   lost the race.
/// - [`DatasetError::Backend`] for precondition violations (parents that do
///   not extend the visible head) and for underlying store/codec failures.
/// - [`DatasetError::Canceled`] if `cancel` is tripped.
#[allow(clippy::too_many_arguments)]
pub fn advance_dataset(
    ds: &Dataset,
    value: &Value,
    options: &CommitOptions,
    meta: CommitMeta,
    store: &dyn ChunkStore,
    retry: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<Dataset, DatasetError> {
    check_preconditions(ds, options, store, cancel)?;

    let value_ref = vellum_values::write(value, store, cancel)?;
    let commit = Commit::new(value_ref, options.parents.clone(), meta);
    let new_ref = write_commit(&commit, store, cancel)?;

    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(DatasetError::Canceled);
        }

        let expected = store.root(cancel)?;
        let mut current_map = read_dataset_map(expected, store, cancel)?;
        let observed = current_map.get(ds.name()).copied();

        debug!(
            dataset = ds.name(),
            attempt,
            observed = ?observed.map(|r| r.hash()),
            expected_head = ?ds.head_ref().map(|r| r.hash()),
            "commit protocol CAS attempt"
        );

        if observed != ds.head_ref() {
            warn!(
                dataset = ds.name(),
                observed = ?observed.map(|r| r.hash()),
                "concurrent update conflict"
            );
            return Err(DatasetError::ConcurrentUpdate {
                name: ds.name().to_string(),
                observed,
            });
        }

        current_map.insert(ds.name().to_string(), new_ref);
        let new_root = write_dataset_map(&current_map, store, cancel)?;

        if store.commit_root(expected, new_root, cancel)? {
            info!(
                dataset = ds.name(),
                commit = %new_ref.hash(),
                parents = commit.num_parents(),
                "commit installed"
            );
            return Ok(Dataset::new(ds.name().to_string(), Some(new_ref)));
        }

        attempt += 1;
        if attempt >= retry.max_attempts {
            return Err(DatasetError::RetryExhausted {
                name: ds.name().to_string(),
                attempts: attempt,
            });
        }
        thread::sleep(retry.backoff_for(attempt));
    }
}

fn check_preconditions(
    ds: &Dataset,
    options: &CommitOptions,
    store: &dyn ChunkStore,
    cancel: &CancellationToken,
) -> Result<(), DatasetError> {
    match ds.head_ref() {
        Some(head) if !options.parents.is_empty() => {
            let extends_head = options.parents.contains(&head)
                || options
                    .parents
                    .iter()
                    .map(|p| is_ancestor(head, *p, store, cancel))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .any(|is_anc| is_anc);
            if !extends_head {
                return Err(DatasetError::Backend {
                    cause: format!(
                        "commit parents do not extend the visible head of dataset {:?}",
                        ds.name()
                    ),
                });
            }
            Ok(())
        }
        None => {
            for parent in &options.parents {
                read_commit(*parent, store, cancel).map_err(|_| DatasetError::Backend {
                    cause: format!(
                        "parent commit {} does not exist in the store",
                        parent.hash()
                    ),
                })?;
            }
            Ok(())
        }
        Some(_) => Ok(()),
    }
}
