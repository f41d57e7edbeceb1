// SPDX-License-Identifier: Apache-2.0
//! History traversal: ancestor queries and time-sorted listings (§4.G).

use std::collections::{HashMap, VecDeque};

use tokio_util::sync::CancellationToken;
use vellum_chunkstore::{ChunkStore, Hash};
use vellum_values::Ref;

use crate::commit::{read_commit, Commit};
use crate::error::DatasetError;

/// Is `candidate` `descendant` itself, or a transitive ancestor of it?
///
/// BFS from `descendant` through `parents`, short-circuiting on a hash match
/// with `candidate`. The visited-set bounds the walk to one pass over the
/// reachable DAG even when merges mean multiple paths lead to the same
/// ancestor.
///
/// # Errors
///
/// Forwards [`DatasetError::Backend`]/[`DatasetError::Canceled`] from reading
/// commits off `store`.
pub fn is_ancestor(
    candidate: Ref<Commit>,
    descendant: Ref<Commit>,
    store: &dyn ChunkStore,
    cancel: &CancellationToken,
) -> Result<bool, DatasetError> {
    if candidate == descendant {
        return Ok(true);
    }
    let mut visited: HashMap<Hash, ()> = HashMap::new();
    let mut queue = VecDeque::new();
    queue.push_back(descendant);
    visited.insert(descendant.hash(), ());

    while let Some(current) = queue.pop_front() {
        let commit = read_commit(current, store, cancel)?;
        for parent in commit.parents() {
            if parent == candidate {
                return Ok(true);
            }
            if visited.insert(parent.hash(), ()).is_none() {
                queue.push_back(parent);
            }
        }
    }
    Ok(false)
}

/// DFS from `start`, collecting up to `limit` distinct reachable commits
/// (`limit < 0` means unbounded), then sort them descending by
/// `meta.user_timestamp` with ties broken by commit hash for a stable,
/// deterministic order.
///
/// Already-seen commits are skipped; parents are visited in the commit's own
/// canonical (hash-sorted) order. Cycles are impossible by construction (a
/// parent's hash cannot depend on its child), but the visited-set still
/// avoids exponential re-traversal across merges.
///
/// # Errors
///
/// Forwards [`DatasetError::Backend`]/[`DatasetError::Canceled`] from reading
/// commits off `store`.
pub fn time_sorted_commits(
    start: Ref<Commit>,
    limit: i64,
    store: &dyn ChunkStore,
    cancel: &CancellationToken,
) -> Result<Vec<(Ref<Commit>, Commit)>, DatasetError> {
    let mut seen: HashMap<Hash, Commit> = HashMap::new();
    let mut stack = vec![start];

    while let Some(r) = stack.pop() {
        if seen.contains_key(&r.hash()) {
            continue;
        }
        if limit >= 0 && seen.len() as i64 >= limit {
            break;
        }
        let commit = read_commit(r, store, cancel)?;
        for parent in commit.parents() {
            if !seen.contains_key(&parent.hash()) {
                stack.push(parent);
            }
        }
        seen.insert(r.hash(), commit);
    }

    let mut out: Vec<(Ref<Commit>, Commit)> = seen
        .into_iter()
        .map(|(hash, commit)| (Ref::new(hash), commit))
        .collect();
    out.sort_by(|(hash_a, a), (hash_b, b)| {
        b.meta()
            .user_timestamp
            .cmp(&a.meta().user_timestamp)
            .then_with(|| hash_a.hash().cmp(&hash_b.hash()))
    });
    Ok(out)
}
