// SPDX-License-Identifier: Apache-2.0
//! Dataset-name grammar (§4.H).

/// Returns `true` if `name` is a legal dataset name.
///
/// Non-empty, ASCII-only, drawn from `[A-Za-z0-9_/\-.]+`. This rejects
/// whitespace, the empty string, and anything outside ASCII — including
/// punctuation that would otherwise look plausible (`"$"`, `"#"`, `":"`) and
/// multi-byte characters (`"💩"`) that could confuse a persisted-map key
/// encoding.
pub fn is_valid_dataset_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'/' | b'-' | b'.'))
}
