// SPDX-License-Identifier: Apache-2.0
//! The structured value model: strings, refs, sets of refs, structs, and maps.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::reference::RawRef;

/// A typed, structurally recursive datum.
///
/// Required variants per the data model: [`Value::Str`], [`Value::Ref`],
/// [`Value::Set`] (of refs), and [`Value::Struct`] (named fields). [`Value::Map`]
/// is an additive extension used only to persist the dataset-name → commit-ref
/// table (§6): no combination of the four required variants can express a
/// dynamically-keyed collection whose keys are arbitrary strings.
///
/// `Set` and `Map` use ordered (`BTree`) collections rather than hash-based
/// ones specifically so that construction order never affects the canonical
/// serialization — see [`Value::canonical_bytes`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Value {
    /// A UTF-8 string.
    Str(String),
    /// A pointer to another value by hash.
    Ref(RawRef),
    /// An unordered, deduplicated collection of refs.
    Set(BTreeSet<RawRef>),
    /// A struct with named fields, each itself a [`Value`].
    Struct(BTreeMap<String, Value>),
    /// A map from string keys to refs. Used for the dataset-map persistence
    /// format (§6); not part of the four required variants.
    Map(BTreeMap<String, RawRef>),
}

impl Value {
    /// Convenience constructor for [`Value::Str`].
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Convenience constructor for [`Value::Struct`] from an iterator of
    /// `(name, value)` pairs.
    pub fn strct<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Value::Struct(fields.into_iter().collect())
    }

    /// Canonical CBOR serialization.
    ///
    /// `BTreeMap`/`BTreeSet` already iterate in sorted-key order, and `ciborium`
    /// serializes a `Serialize` impl's iteration order verbatim — so the bytes
    /// produced here depend only on the value's logical content, never on the
    /// order a caller happened to insert fields or set members in.
    ///
    /// # Errors
    ///
    /// Returns an error if the value's in-memory contents are not encodable;
    /// practically unreachable for a value built from this module's
    /// constructors.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, ciborium::ser::Error<std::io::Error>> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)?;
        Ok(bytes)
    }
}
