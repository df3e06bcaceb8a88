// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Collision-free resource names.
//!
//! Concurrent scenarios must never address the same name within one scope, so
//! every name the harness creates is either randomized ([`unique_name`]) or
//! derived from a per-run suffix ([`suffix_name`]). Both respect the length
//! limit of the target resource type.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of the hash appended when a name has to be truncated.
const HASH_LEN: usize = 8;

/// Join `base` and `suffix` with `-`, keeping the result within `max_len`.
///
/// When the joined name is too long, `base` is truncated and an 8 hex digit
/// hash of the full joined name is appended instead of `suffix`, so distinct
/// inputs stay distinct after truncation.
///
/// # Example
///
/// ```rust
/// use hcpverify::naming::suffix_name;
///
/// assert_eq!(suffix_name("e2e-np", "abc123", 64), "e2e-np-abc123");
/// assert_eq!(suffix_name("averyveryverylongbase", "x", 15).len(), 15);
/// ```
#[must_use]
pub fn suffix_name(base: &str, suffix: &str, max_len: usize) -> String {
    let joined = if suffix.is_empty() {
        base.to_string()
    } else {
        format!("{base}-{suffix}")
    };
    if joined.len() <= max_len {
        return joined;
    }

    let hash = format!("{:08x}", fnv1a_32(joined.as_bytes()));
    if max_len <= HASH_LEN + 1 {
        return hash[..max_len.min(HASH_LEN)].to_string();
    }

    let keep = truncate_at_char_boundary(base, max_len - HASH_LEN - 1);
    let keep = keep.trim_end_matches('-');
    format!("{keep}-{hash}")
}

/// `prefix` followed by a random lowercase alphanumeric suffix.
///
/// Names are lowercase because several resource types reject upper case.
#[must_use]
pub fn unique_name(prefix: &str, max_len: usize) -> String {
    let suffix = random_suffix(crate::constants::RANDOM_SUFFIX_LEN);
    suffix_name(prefix, &suffix, max_len)
}

/// Random lowercase alphanumeric string of `len` characters.
#[must_use]
pub fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

fn fnv1a_32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    bytes.iter().fold(OFFSET_BASIS, |hash, b| {
        (hash ^ u32::from(*b)).wrapping_mul(PRIME)
    })
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
