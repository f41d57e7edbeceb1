// SPDX-License-Identifier: Apache-2.0
//! The immutable commit object (§3, §4.E).

use std::collections::{BTreeMap, BTreeSet};

use tokio_util::sync::CancellationToken;
use vellum_chunkstore::{ChunkStore, Hash};
use vellum_values::{Ref, Value};

use crate::error::DatasetError;

/// Author/message/timestamp metadata attached to a [`Commit`].
///
/// Participates in the commit's hash — two commits with identical payload and
/// parents but different messages are distinct commits.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct CommitMeta {
    /// Author display name.
    pub name: String,
    /// Author email.
    pub email: String,
    /// Free-form commit message.
    pub message: String,
    /// Caller-supplied logical timestamp (unix millis), used for history
    /// ordering (§4.G).
    pub user_timestamp: i64,
    /// Wall-clock timestamp recorded by the database at commit time (unix
    /// millis).
    pub system_timestamp: i64,
    /// Opaque caller-defined extras, preserved and hashed but not
    /// interpreted by this crate.
    pub extras: BTreeMap<String, String>,
}

impl CommitMeta {
    fn to_value(&self) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), Value::string(self.name.clone()));
        fields.insert("email".to_string(), Value::string(self.email.clone()));
        fields.insert(
            "message".to_string(),
            Value::string(self.message.clone()),
        );
        fields.insert(
            "user_timestamp".to_string(),
            Value::string(self.user_timestamp.to_string()),
        );
        fields.insert(
            "system_timestamp".to_string(),
            Value::string(self.system_timestamp.to_string()),
        );
        let extras = self
            .extras
            .iter()
            .map(|(k, v)| (k.clone(), Value::string(v.clone())))
            .collect();
        fields.insert("extras".to_string(), Value::Struct(extras));
        Value::Struct(fields)
    }

    fn from_value(value: &Value) -> Result<Self, DatasetError> {
        let Value::Struct(fields) = value else {
            return Err(decode_err("commit meta was not a struct"));
        };
        let string_field = |key: &str| -> Result<String, DatasetError> {
            match fields.get(key) {
                Some(Value::Str(s)) => Ok(s.clone()),
                _ => Err(decode_err(&format!("missing or non-string field {key:?}"))),
            }
        };
        let int_field = |key: &str| -> Result<i64, DatasetError> {
            string_field(key)?
                .parse::<i64>()
                .map_err(|e| decode_err(&format!("field {key:?} was not an integer: {e}")))
        };
        let extras = match fields.get("extras") {
            Some(Value::Struct(e)) => e
                .iter()
                .map(|(k, v)| match v {
                    Value::Str(s) => Ok((k.clone(), s.clone())),
                    _ => Err(decode_err("extras values must be strings")),
                })
                .collect::<Result<BTreeMap<_, _>, _>>()?,
            _ => return Err(decode_err("missing extras struct")),
        };
        Ok(CommitMeta {
            name: string_field("name")?,
            email: string_field("email")?,
            message: string_field("message")?,
            user_timestamp: int_field("user_timestamp")?,
            system_timestamp: int_field("system_timestamp")?,
            extras,
        })
    }
}

fn decode_err(cause: &str) -> DatasetError {
    DatasetError::Backend {
        cause: format!("commit decode: {cause}"),
    }
}

/// An immutable (value, parent-set, meta) record — a node in the history DAG.
///
/// A `Commit`'s hash is a pure function of its three fields (§3 invariants).
/// Parents are stored as a set: dedup'd by hash, with no semantic ordering,
/// though [`Commit::parent`] exposes them in canonical (hash-sorted) order for
/// deterministic iteration.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Commit {
    value_ref: Ref<Value>,
    parents: BTreeSet<Ref<Commit>>,
    meta: CommitMeta,
}

impl Commit {
    /// Construct the in-memory commit object. Does not write anything to a
    /// store — see [`write_commit`] for that.
    pub fn new(
        value_ref: Ref<Value>,
        parents: BTreeSet<Ref<Commit>>,
        meta: CommitMeta,
    ) -> Self {
        Self {
            value_ref,
            parents,
            meta,
        }
    }

    /// Number of parents: 0 for a root commit, 1 for linear history, ≥2 for
    /// a merge.
    pub fn num_parents(&self) -> usize {
        self.parents.len()
    }

    /// The `i`th parent in canonical (hash-sorted) order, or `None` if out of
    /// range.
    pub fn parent(&self, i: usize) -> Option<Ref<Commit>> {
        self.parents.iter().nth(i).copied()
    }

    /// All parents in canonical (hash-sorted) order.
    pub fn parents(&self) -> impl Iterator<Item = Ref<Commit>> + '_ {
        self.parents.iter().copied()
    }

    /// This commit's metadata.
    pub fn meta(&self) -> &CommitMeta {
        &self.meta
    }

    /// Reference to this commit's payload value.
    pub fn value_ref(&self) -> Ref<Value> {
        self.value_ref
    }

    fn to_value(&self) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert("value".to_string(), Value::Ref(self.value_ref.to_raw()));
        fields.insert(
            "parents".to_string(),
            Value::Set(self.parents.iter().map(|p| p.to_raw()).collect()),
        );
        fields.insert("meta".to_string(), self.meta.to_value());
        Value::Struct(fields)
    }

    fn from_value(value: &Value) -> Result<Self, DatasetError> {
        let Value::Struct(fields) = value else {
            return Err(decode_err("commit was not a struct"));
        };
        let value_ref = match fields.get("value") {
            Some(Value::Ref(r)) => Ref::from_raw(*r),
            _ => return Err(decode_err("missing value ref")),
        };
        let parents = match fields.get("parents") {
            Some(Value::Set(s)) => s.iter().map(|r| Ref::from_raw(*r)).collect(),
            _ => return Err(decode_err("missing parents set")),
        };
        let meta = match fields.get("meta") {
            Some(v) => CommitMeta::from_value(v)?,
            None => return Err(decode_err("missing meta")),
        };
        Ok(Commit::new(value_ref, parents, meta))
    }
}

/// Serialize `commit`, write it through `store`, and return both the decoded
/// object and a typed ref to it.
///
/// # Errors
///
/// Forwards [`DatasetError::Backend`]/[`DatasetError::Canceled`] from the
/// underlying store.
pub fn write_commit(
    commit: &Commit,
    store: &dyn ChunkStore,
    cancel: &CancellationToken,
) -> Result<Ref<Commit>, DatasetError> {
    let bytes = commit.to_value().canonical_bytes().map_err(|e| {
        DatasetError::Backend {
            cause: format!("commit encode: {e}"),
        }
    })?;
    store.put(&bytes, cancel)?;
    Ok(Ref::new(commit_hash(commit)?))
}

/// Read back the commit addressed by `r`.
///
/// # Errors
///
/// Returns [`DatasetError::Backend`] if the chunk is missing or does not
/// decode as a well-formed commit, or [`DatasetError::Canceled`].
pub fn read_commit(
    r: Ref<Commit>,
    store: &dyn ChunkStore,
    cancel: &CancellationToken,
) -> Result<Commit, DatasetError> {
    let hash = r.hash();
    let bytes = store
        .get(&hash, cancel)?
        .ok_or_else(|| decode_err(&format!("no chunk found for commit hash {hash}")))?;
    let value: Value = ciborium::de::from_reader(bytes.as_ref())
        .map_err(|e| decode_err(&format!("commit bytes did not decode as a value: {e}")))?;
    Commit::from_value(&value)
}

pub(crate) fn commit_hash(commit: &Commit) -> Result<Hash, DatasetError> {
    let bytes = commit.to_value().canonical_bytes().map_err(|e| {
        DatasetError::Backend {
            cause: format!("commit encode: {e}"),
        }
    })?;
    Ok(vellum_chunkstore::hash_bytes(&bytes))
}
