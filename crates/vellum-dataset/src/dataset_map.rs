// SPDX-License-Identifier: Apache-2.0
//! Persistence format for the database's view of all dataset heads (§3, §6).

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use vellum_chunkstore::{ChunkStore, Hash};
use vellum_values::{Ref, Value};

use crate::commit::Commit;
use crate::error::DatasetError;

/// Read the `DatasetMap` value addressed by `root`.
///
/// [`Hash::ZERO`] is treated as "empty store" and yields an empty map without
/// touching the chunk store, matching §4.A's "zero hash means no root".
///
/// # Errors
///
/// Returns [`DatasetError::Backend`] if the root chunk is missing or does not
/// decode as a well-formed map value, or [`DatasetError::Canceled`].
pub fn read_dataset_map(
    root: Hash,
    store: &dyn ChunkStore,
    cancel: &CancellationToken,
) -> Result<BTreeMap<String, Ref<Commit>>, DatasetError> {
    if root.is_zero() {
        return Ok(BTreeMap::new());
    }
    let bytes = store.get(&root, cancel)?.ok_or_else(|| DatasetError::Backend {
        cause: format!("no chunk found for dataset map root {root}"),
    })?;
    let value: Value = ciborium::de::from_reader(bytes.as_ref()).map_err(|e| {
        DatasetError::Backend {
            cause: format!("dataset map root {root} did not decode as a value: {e}"),
        }
    })?;
    let Value::Map(entries) = value else {
        return Err(DatasetError::Backend {
            cause: format!("dataset map root {root} was not a map value"),
        });
    };
    Ok(entries
        .into_iter()
        .map(|(name, raw)| (name, Ref::from_raw(raw)))
        .collect())
}

/// Serialize `map` and `put` it into `store`, returning the new root hash.
///
/// # Errors
///
/// Returns [`DatasetError::Backend`] or [`DatasetError::Canceled`].
pub fn write_dataset_map(
    map: &BTreeMap<String, Ref<Commit>>,
    store: &dyn ChunkStore,
    cancel: &CancellationToken,
) -> Result<Hash, DatasetError> {
    let entries = map.iter().map(|(k, v)| (k.clone(), v.to_raw())).collect();
    let value = Value::Map(entries);
    let bytes = value.canonical_bytes().map_err(|e| DatasetError::Backend {
        cause: format!("dataset map encode: {e}"),
    })?;
    Ok(store.put(&bytes, cancel)?)
}
