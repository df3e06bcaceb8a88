// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error-message pattern table.
//!
//! Negative scenarios assert on the human-readable message the service
//! returns. Exact wording drifts between backend versions, so every assertion
//! goes through a named, case-insensitive [`ErrorPattern`] defined here rather
//! than an inline string comparison. When the backend changes its wording,
//! this table is the single place to update.
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | [`DUPLICATE_OR_IMMUTABLE`] | `immutable`, `already in use`, `duplicate` |
//! | [`OUT_OF_RANGE`] | `negative`, `invalid`, `exceed` |
//! | [`LAST_NODE_POOL`] | `last node pool` |
//! | [`NAMING_RESTRICTION`] | `naming restriction` |
//! | [`INVALID_TENANT`] | `tenant` |
//! | [`INVALID_AUDIENCE`] | `client`, `audience` |

use crate::errors::{Result, VerifyError};
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::LazyLock;

/// A named, case-insensitive regular expression over service error messages.
#[derive(Clone)]
pub struct ErrorPattern {
    name: String,
    regex: Regex,
}

impl ErrorPattern {
    /// Compile a pattern. Matching is always case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Config`] when `pattern` is not a valid regex.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self> {
        let name = name.into();
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| VerifyError::Config {
                reason: format!("invalid error pattern '{name}': {e}"),
            })?;
        Ok(Self { name, regex })
    }

    /// Pattern matching any of `substrings` literally.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Config`] when `substrings` is empty.
    pub fn any_of(name: impl Into<String>, substrings: &[&str]) -> Result<Self> {
        let name = name.into();
        if substrings.is_empty() {
            return Err(VerifyError::Config {
                reason: format!("error pattern '{name}' has no alternatives"),
            });
        }
        let alternation = substrings
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        Self::new(name, &alternation)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    #[must_use]
    pub fn is_match(&self, message: &str) -> bool {
        self.regex.is_match(message)
    }
}

impl fmt::Debug for ErrorPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorPattern({} = /{}/i)", self.name, self.regex.as_str())
    }
}

impl fmt::Display for ErrorPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (/{}/i)", self.name, self.regex.as_str())
    }
}

fn builtin(name: &str, pattern: &str) -> ErrorPattern {
    ErrorPattern::new(name, pattern).expect("built-in error patterns are valid regexes")
}

/// Re-creating an existing name, or changing an immutable field of it.
pub static DUPLICATE_OR_IMMUTABLE: LazyLock<ErrorPattern> = LazyLock::new(|| {
    builtin(
        "duplicate-or-immutable",
        r"immutable|already in use|duplicate",
    )
});

/// A numeric field outside its allowed range.
pub static OUT_OF_RANGE: LazyLock<ErrorPattern> =
    LazyLock::new(|| builtin("out-of-range", r"negative|invalid|exceed"));

/// Deleting the only node pool of a cluster.
pub static LAST_NODE_POOL: LazyLock<ErrorPattern> =
    LazyLock::new(|| builtin("last-node-pool", r"last node pool"));

/// Resource names violating the naming rules.
pub static NAMING_RESTRICTION: LazyLock<ErrorPattern> =
    LazyLock::new(|| builtin("naming-restriction", r"does not conform to the naming restriction"));

/// External auth issuer pointing at a tenant that does not exist.
pub static INVALID_TENANT: LazyLock<ErrorPattern> =
    LazyLock::new(|| builtin("invalid-tenant", r"tenant"));

/// External auth audience or client id not registered in the tenant.
pub static INVALID_AUDIENCE: LazyLock<ErrorPattern> =
    LazyLock::new(|| builtin("invalid-audience", r"client|audience"));

/// Every built-in pattern, for listing and lookup by name.
#[must_use]
pub fn builtin_patterns() -> Vec<&'static ErrorPattern> {
    vec![
        &*DUPLICATE_OR_IMMUTABLE,
        &*OUT_OF_RANGE,
        &*LAST_NODE_POOL,
        &*NAMING_RESTRICTION,
        &*INVALID_TENANT,
        &*INVALID_AUDIENCE,
    ]
}

/// Look up a built-in pattern by name.
#[must_use]
pub fn find_pattern(name: &str) -> Option<&'static ErrorPattern> {
    builtin_patterns().into_iter().find(|p| p.name() == name)
}

#[cfg(test)]
#[path = "patterns_tests.rs"]
mod patterns_tests;
