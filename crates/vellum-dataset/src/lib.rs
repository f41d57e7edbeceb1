// SPDX-License-Identifier: Apache-2.0
//! Named, atomically-updated references over an immutable commit DAG.
//!
//! `vellum-dataset` is the top half of vellum: it owns the [`Commit`] object,
//! the [`Dataset`] handle, the [`Database`] that maps dataset names to heads,
//! the CAS-based commit protocol that advances them ([`advance_dataset`]),
//! history traversal ([`is_ancestor`], [`time_sorted_commits`]), and the
//! staged-commit composer built on top of all of it. It is built entirely in
//! terms of the [`vellum_chunkstore::ChunkStore`] and
//! [`vellum_values::Value`] contracts from the two crates below it — no
//! storage backend or SQL/table layer lives here.
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
    clippy::multiple_crate_versions,
    clippy::too_many_lines
)]

mod commit;
mod composer;
mod config;
mod database;
mod dataset;
mod dataset_map;
mod error;
mod history;
mod name;
mod protocol;

pub use commit::{read_commit, write_commit, Commit, CommitMeta};
pub use composer::{commit_staged, CommitRequest, RepoState};
pub use config::DatabaseOptions;
pub use database::Database;
pub use dataset::Dataset;
pub use error::DatasetError;
pub use history::{is_ancestor, time_sorted_commits};
pub use name::is_valid_dataset_name;
pub use protocol::{advance_dataset, CommitOptions, RetryConfig};
