// SPDX-License-Identifier: Apache-2.0
//! In-process configuration surface for a [`crate::Database`] (§10.3).
//!
//! There is no file or CLI config layer here — just the handful of knobs the
//! core itself owns: the CAS retry ceiling/backoff and the codec format tag.

use vellum_values::FormatTag;

use crate::protocol::RetryConfig;

/// Options governing a [`crate::Database`]'s commit protocol and codec.
#[derive(Clone, Debug)]
pub struct DatabaseOptions {
    /// CAS retry policy for the commit protocol (§5 "CAS retry budget").
    pub retry: RetryConfig,
    /// The value codec format tag this database reads and writes under.
    pub format: FormatTag,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            format: FormatTag::CURRENT,
        }
    }
}
