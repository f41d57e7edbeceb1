// SPDX-License-Identifier: Apache-2.0
//! Staged-commit composer: the higher-level "commit staged changes"
//! operation built on top of the commit protocol (§4.I).
//!
//! Foreign-key validation and super-schema propagation are named seams only
//! — the structured-value/SQL layer that would implement them for real sits
//! above this crate. Callers inject closures for both so the composer can be
//! exercised without a real table layer.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use vellum_values::{Ref, Value};

use crate::commit::{Commit, CommitMeta};
use crate::dataset::Dataset;
use crate::database::Database;
use crate::error::DatasetError;
use crate::protocol::CommitOptions;

/// Repository state the composer reads to decide what to commit.
pub struct RepoState {
    /// The currently staged root value.
    pub staged_root: Value,
    /// The working root value, updated by super-schema propagation.
    pub working_root: Value,
    /// The head commit of the branch being committed to.
    pub branch_head: Dataset,
    /// Whether a merge is currently in progress.
    pub is_merge_active: bool,
    /// If a merge is in progress, the commit being merged in.
    pub merge_commit_spec: Option<Ref<Commit>>,
    /// Number of tables still recorded as in conflict, if a merge is active.
    pub tables_in_conflict: usize,
}

/// Caller-supplied metadata for a staged commit.
pub struct CommitRequest {
    /// Commit message. Empty is rejected (§4.I step 1).
    pub message: String,
    /// Caller-supplied logical timestamp (unix millis).
    pub date: i64,
    /// Commit even if the staged-vs-head delta is empty and no merge is
    /// active.
    pub allow_empty: bool,
    /// Whether to run `check_foreign_keys` against the staged root before
    /// committing.
    pub check_foreign_keys: bool,
    /// Author display name.
    pub name: String,
    /// Author email.
    pub email: String,
}

/// Compose and install a staged commit, per the nine-step procedure of
/// §4.I.
///
/// `now` supplies the system timestamp (§9: timestamps are caller-supplied,
/// not read from a wall clock inside this crate, so callers control
/// determinism in tests).
///
/// # Errors
///
/// - [`DatasetError::EmptyMessage`] if `request.message` is empty.
/// - [`DatasetError::NothingToCommit`] if the staged-vs-head delta is empty,
///   no merge is active, and `request.allow_empty` is false.
/// - [`DatasetError::MergeHasConflicts`] if a merge is active with unresolved
///   conflicts.
/// - [`DatasetError::ForeignKeyViolation`] if `check_foreign_keys` is
///   requested and `check_foreign_keys` rejects the staged root.
/// - Whatever [`crate::protocol::advance_dataset`] can return, forwarded
///   from the underlying commit protocol call.
#[allow(clippy::too_many_arguments)]
pub fn commit_staged(
    db: &Database,
    state: &RepoState,
    request: &CommitRequest,
    now: i64,
    check_foreign_keys: impl Fn(&Value) -> Result<(), String>,
    propagate_super_schema: impl Fn(&Value, &Value) -> Value,
    cancel: &CancellationToken,
) -> Result<Dataset, DatasetError> {
    if request.message.is_empty() {
        return Err(DatasetError::EmptyMessage);
    }

    let delta_is_empty = delta_is_empty(state);
    if delta_is_empty && !state.is_merge_active && !request.allow_empty {
        return Err(DatasetError::NothingToCommit);
    }

    let mut parents: BTreeSet<Ref<Commit>> = state.branch_head.head_ref().into_iter().collect();
    if state.is_merge_active {
        if state.tables_in_conflict > 0 {
            return Err(DatasetError::MergeHasConflicts {
                count: state.tables_in_conflict,
            });
        }
        if let Some(merge_parent) = state.merge_commit_spec {
            parents.insert(merge_parent);
        }
    }

    if request.check_foreign_keys {
        check_foreign_keys(&state.staged_root).map_err(|cause| {
            DatasetError::ForeignKeyViolation { cause }
        })?;
    }

    let updated_working = propagate_super_schema(&state.staged_root, &state.working_root);

    let meta = CommitMeta {
        name: request.name.clone(),
        email: request.email.clone(),
        message: request.message.clone(),
        user_timestamp: request.date,
        system_timestamp: now,
        extras: std::collections::BTreeMap::new(),
    };

    db.commit(
        &state.branch_head,
        &updated_working,
        &CommitOptions { parents },
        meta,
        cancel,
    )
}

fn delta_is_empty(state: &RepoState) -> bool {
    state.staged_root == state.working_root
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vellum_chunkstore::MemoryStore;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    fn request(message: &str) -> CommitRequest {
        CommitRequest {
            message: message.to_string(),
            date: 42,
            allow_empty: false,
            check_foreign_keys: false,
            name: "alice".to_string(),
            email: "a@example.com".to_string(),
        }
    }

    fn base_state(head: Dataset) -> RepoState {
        RepoState {
            staged_root: Value::string("staged"),
            working_root: Value::string("working"),
            branch_head: head,
            is_merge_active: false,
            merge_commit_spec: None,
            tables_in_conflict: 0,
        }
    }

    #[test]
    fn empty_message_is_rejected_before_anything_else() {
        let db = Database::open(Arc::new(MemoryStore::new()));
        let t = token();
        let ds = db.get_dataset("testdataset", &t).unwrap();
        let state = base_state(ds);
        let err = commit_staged(
            &db,
            &state,
            &request(""),
            100,
            |_| Ok(()),
            |_staged, working| working.clone(),
            &t,
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::EmptyMessage));
    }

    #[test]
    fn no_delta_and_no_merge_without_allow_empty_is_rejected() {
        let db = Database::open(Arc::new(MemoryStore::new()));
        let t = token();
        let ds = db.get_dataset("testdataset", &t).unwrap();
        let mut state = base_state(ds);
        state.working_root = state.staged_root.clone();
        let err = commit_staged(
            &db,
            &state,
            &request("no-op"),
            100,
            |_| Ok(()),
            |_staged, working| working.clone(),
            &t,
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::NothingToCommit));
    }

    #[test]
    fn merge_with_conflicts_is_rejected() {
        let db = Database::open(Arc::new(MemoryStore::new()));
        let t = token();
        let ds = db.get_dataset("testdataset", &t).unwrap();
        let mut state = base_state(ds);
        state.is_merge_active = true;
        state.tables_in_conflict = 2;
        let err = commit_staged(
            &db,
            &state,
            &request("merge"),
            100,
            |_| Ok(()),
            |_staged, working| working.clone(),
            &t,
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::MergeHasConflicts { count: 2 }));
    }

    #[test]
    fn foreign_key_rejection_aborts_without_mutation() {
        let db = Database::open(Arc::new(MemoryStore::new()));
        let t = token();
        let ds = db.get_dataset("testdataset", &t).unwrap();
        let mut req = request("bad fk");
        req.check_foreign_keys = true;
        let state = base_state(ds);
        let err = commit_staged(
            &db,
            &state,
            &req,
            100,
            |_| Err("dangling reference".to_string()),
            |_staged, working| working.clone(),
            &t,
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::ForeignKeyViolation { .. }));
        assert!(!db.get_dataset("testdataset", &t).unwrap().has_head());
    }

    #[test]
    fn successful_commit_installs_propagated_working_root() {
        let db = Database::open(Arc::new(MemoryStore::new()));
        let t = token();
        let ds = db.get_dataset("testdataset", &t).unwrap();
        let state = base_state(ds);
        let advanced = commit_staged(
            &db,
            &state,
            &request("first"),
            100,
            |_| Ok(()),
            |staged, _working| staged.clone(),
            &t,
        )
        .unwrap();
        assert!(advanced.has_head());
        assert_eq!(advanced.head_value(db.store(), &t), Value::string("staged"));
    }
}
