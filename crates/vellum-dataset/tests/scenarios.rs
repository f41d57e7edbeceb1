// SPDX-License-Identifier: Apache-2.0
//! End-to-end scenarios exercising the Database, Dataset, and commit
//! protocol together (mirrors the concrete scenarios enumerated for this
//! core: linear commits, explicit-parent branching, two-client contention on
//! both empty and non-empty datasets, name validation, and head accessors on
//! an absent head).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vellum_chunkstore::MemoryStore;
use vellum_dataset::{CommitOptions, Database, Dataset};
use vellum_values::Value;

fn token() -> CancellationToken {
    CancellationToken::new()
}

fn db() -> Database {
    Database::open(Arc::new(MemoryStore::new()))
}

#[test]
fn linear_commit() {
    let db = db();
    let t = token();

    let ds = db.get_dataset("testdataset", &t).unwrap();
    assert!(!ds.has_head());

    let ds = db.commit_value(&ds, &Value::string("a"), &t).unwrap();
    assert_eq!(ds.head_value(db.store(), &t), Value::string("a"));
}

#[test]
fn branching_via_explicit_parents() {
    let db = db();
    let t = token();

    let ds1 = db.get_dataset("testdataset", &t).unwrap();
    let ds1 = db.commit_value(&ds1, &Value::string("a"), &t).unwrap();

    let ds2 = db.get_dataset("otherds", &t).unwrap();
    let options = CommitOptions {
        parents: [ds1.head_ref().unwrap()].into_iter().collect(),
    };
    let ds2 = db
        .commit(
            &ds2,
            &ds1.head_value(db.store(), &t),
            &options,
            Default::default(),
            &t,
        )
        .unwrap();
    assert_eq!(ds2.head_value(db.store(), &t), Value::string("a"));

    let ds1 = db.commit_value(&ds1, &Value::string("b"), &t).unwrap();
    assert_eq!(ds1.head_value(db.store(), &t), Value::string("b"));
    assert_eq!(ds2.head_value(db.store(), &t), Value::string("a"));

    let ds2 = db.commit_value(&ds2, &Value::string("c"), &t).unwrap();
    assert_eq!(ds2.head_value(db.store(), &t), Value::string("c"));

    let merge_options = CommitOptions {
        parents: [ds1.head_ref().unwrap(), ds2.head_ref().unwrap()]
            .into_iter()
            .collect(),
    };
    let ds1_merged = db
        .commit(
            &ds1,
            &Value::string("d"),
            &merge_options,
            Default::default(),
            &t,
        )
        .unwrap();
    let ds2_merged = db
        .commit(
            &ds2,
            &Value::string("d"),
            &merge_options,
            Default::default(),
            &t,
        )
        .unwrap();

    assert_eq!(ds1_merged.head_value(db.store(), &t), Value::string("d"));
    assert_eq!(ds2_merged.head_value(db.store(), &t), Value::string("d"));
    assert_eq!(ds1_merged.head(db.store(), &t).num_parents(), 2);
    assert_eq!(ds2_merged.head(db.store(), &t).num_parents(), 2);
}

#[test]
fn two_clients_empty_dataset() {
    let db = db();
    let t = token();

    let dsx = db.get_dataset("testdataset", &t).unwrap();
    let dsy = db.get_dataset("testdataset", &t).unwrap();

    let dsx = db.commit_value(&dsx, &Value::string("a"), &t).unwrap();

    let err = db
        .commit_value(&dsy, &Value::string("b"), &t)
        .unwrap_err();
    let vellum_dataset::DatasetError::ConcurrentUpdate { observed, .. } = err else {
        panic!("expected ConcurrentUpdate, got {err:?}");
    };

    let dsy = Dataset::new("testdataset".to_string(), observed);
    assert_eq!(dsy.head_value(db.store(), &t), Value::string("a"));
    assert_eq!(dsy.head_ref(), dsx.head_ref());

    let dsy = db.commit_value(&dsy, &Value::string("b"), &t).unwrap();
    assert_eq!(dsy.head_value(db.store(), &t), Value::string("b"));
}

#[test]
fn two_clients_non_empty_dataset() {
    let db = db();
    let t = token();

    let ds = db.get_dataset("testdataset", &t).unwrap();
    let ds = db.commit_value(&ds, &Value::string("a"), &t).unwrap();

    let dsx = db.get_dataset("testdataset", &t).unwrap();
    let dsy = db.get_dataset("testdataset", &t).unwrap();
    assert_eq!(dsx.head_ref(), ds.head_ref());
    assert_eq!(dsy.head_ref(), ds.head_ref());

    let dsx = db.commit_value(&dsx, &Value::string("b"), &t).unwrap();
    assert_eq!(dsx.head_value(db.store(), &t), Value::string("b"));

    let err = db
        .commit_value(&dsy, &Value::string("c"), &t)
        .unwrap_err();
    let vellum_dataset::DatasetError::ConcurrentUpdate { observed, .. } = err else {
        panic!("expected ConcurrentUpdate, got {err:?}");
    };

    let dsy = Dataset::new("testdataset".to_string(), observed);
    assert_eq!(dsy.head_value(db.store(), &t), Value::string("b"));

    let dsy = db.commit_value(&dsy, &Value::string("c"), &t).unwrap();
    assert_eq!(dsy.head_value(db.store(), &t), Value::string("c"));
}

#[test]
fn name_validation() {
    let db = db();
    let t = token();

    for bad_name in ["", " a", "\u{1F4A9}"] {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            db.get_dataset(bad_name, &t)
        }));
        assert!(result.is_err(), "expected {bad_name:?} to panic");
    }
}

#[test]
fn head_accessors_on_absent_head() {
    let db = db();
    let t = token();

    let ds = db.get_dataset("never-written", &t).unwrap();
    let (value, present) = ds.maybe_head_value(db.store(), &t).unwrap();
    assert!(value.is_none());
    assert!(!present);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        ds.head_value(db.store(), &t)
    }));
    assert!(result.is_err(), "expected head_value on absent head to panic");
}
