// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provisioning states and terminal-state classification.
//!
//! The service under test owns every state transition; the harness only reads
//! states and decides whether polling can stop. Unrecognized values are kept
//! verbatim in [`ProvisioningState::Unknown`] and classified as non-terminal so
//! a new backend state never ends a poll early.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an asynchronously provisioned resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProvisioningState {
    Accepted,
    Provisioning,
    Updating,
    Deleting,
    Succeeded,
    Failed,
    Canceled,
    /// Any value not listed above, preserved as sent by the service
    Unknown(String),
}

/// Result of classifying a [`ProvisioningState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    NonTerminal,
    TerminalSuccess,
    TerminalFailure,
}

impl Classification {
    /// `true` for both terminal outcomes.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Classification::NonTerminal)
    }
}

/// Classify a provisioning state.
///
/// `Succeeded` is the only terminal success; `Failed` and `Canceled` are
/// terminal failures. Everything else, including unknown values, keeps the
/// poller going.
#[must_use]
pub fn classify(state: &ProvisioningState) -> Classification {
    match state {
        ProvisioningState::Succeeded => Classification::TerminalSuccess,
        ProvisioningState::Failed | ProvisioningState::Canceled => Classification::TerminalFailure,
        _ => Classification::NonTerminal,
    }
}

impl ProvisioningState {
    /// Wire spelling of the state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ProvisioningState::Accepted => "Accepted",
            ProvisioningState::Provisioning => "Provisioning",
            ProvisioningState::Updating => "Updating",
            ProvisioningState::Deleting => "Deleting",
            ProvisioningState::Succeeded => "Succeeded",
            ProvisioningState::Failed => "Failed",
            ProvisioningState::Canceled => "Canceled",
            ProvisioningState::Unknown(raw) => raw,
        }
    }

    #[must_use]
    pub fn classification(&self) -> Classification {
        classify(self)
    }
}

impl FromStr for ProvisioningState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Operation status documents spell the running state "InProgress".
        let state = match s.trim().to_ascii_lowercase().as_str() {
            "accepted" => ProvisioningState::Accepted,
            "provisioning" | "inprogress" | "creating" => ProvisioningState::Provisioning,
            "updating" => ProvisioningState::Updating,
            "deleting" => ProvisioningState::Deleting,
            "succeeded" => ProvisioningState::Succeeded,
            "failed" => ProvisioningState::Failed,
            "canceled" | "cancelled" => ProvisioningState::Canceled,
            _ => ProvisioningState::Unknown(s.to_string()),
        };
        Ok(state)
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProvisioningState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProvisioningState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let Ok(state) = raw.parse::<ProvisioningState>();
        Ok(state)
    }
}

#[cfg(test)]
#[path = "provisioning_tests.rs"]
mod provisioning_tests;
