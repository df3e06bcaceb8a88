// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error taxonomy for the convergence verifier.
//!
//! The variants keep apart outcomes that callers must never confuse:
//!
//! - a **rejection** or **async failure** is a definite negative answer from
//!   the service, and negative scenarios assert on it
//! - a **timeout** or **cancellation** means the outcome is unknown
//! - a **transport** error says nothing about resource state at all
//!
//! Every variant carries the operation name and resource identity so a failed
//! scenario can be attributed without re-reading logs.

use crate::cloud_error::CloudErrorBody;
use crate::provisioning::ProvisioningState;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = VerifyError> = std::result::Result<T, E>;

/// Errors produced while submitting, polling, or verifying an operation.
#[derive(Error, Debug, Clone)]
pub enum VerifyError {
    /// A prerequisite failed before the operation under test began.
    ///
    /// Fatal to the scenario and never retried.
    #[error("setup step '{step}' failed: {reason}")]
    Setup {
        /// Human-readable name of the setup step
        step: String,
        /// Why it failed
        reason: String,
    },

    /// The service rejected a mutation synchronously (HTTP 4xx on submit).
    ///
    /// Expected in negative scenarios, a normal outcome rather than a harness bug.
    #[error("{operation} of {resource} rejected (HTTP {status}): {error}{}", correlation_suffix(.correlation_id))]
    ImmediateRejection {
        operation: String,
        resource: String,
        status: u16,
        error: CloudErrorBody,
        correlation_id: Option<String>,
    },

    /// Polling observed a terminal failure state.
    #[error("{operation} of {resource} reached state {state}{}", error_suffix(.error))]
    AsyncFailure {
        operation: String,
        resource: String,
        state: ProvisioningState,
        error: Option<CloudErrorBody>,
    },

    /// No terminal state was observed before the poll timeout.
    #[error("timed out after {elapsed:?} waiting for {operation} of {resource} (last state: {})", last_state_label(.last_state))]
    Timeout {
        operation: String,
        resource: String,
        elapsed: Duration,
        last_state: Option<ProvisioningState>,
    },

    /// The scenario deadline or an external signal aborted polling.
    #[error("{operation} of {resource} canceled before reaching a terminal state")]
    Canceled { operation: String, resource: String },

    /// Network or HTTP-layer failure unrelated to resource state.
    #[error("transport error during {operation} of {resource}{}: {reason}{}", status_suffix(.status), correlation_suffix(.correlation_id))]
    Transport {
        operation: String,
        resource: String,
        status: Option<u16>,
        reason: String,
        correlation_id: Option<String>,
    },

    /// The resource does not exist (yet).
    #[error("resource {resource} not found")]
    NotFound { resource: String },

    /// A poll configuration violated `interval > 0` and `timeout > interval`.
    #[error("invalid poll configuration: {reason}")]
    InvalidPollConfig { reason: String },

    /// A response body could not be decoded.
    #[error("failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    /// An outcome did not satisfy the scenario expectation.
    #[error("verification failed: {message}")]
    Verification { message: String },

    /// Harness configuration is incomplete or malformed.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl VerifyError {
    /// The service-provided message a negative scenario matches against.
    ///
    /// Only rejections and async failures carry one.
    #[must_use]
    pub fn service_message(&self) -> Option<String> {
        match self {
            VerifyError::ImmediateRejection { error, .. } => Some(error.to_string()),
            VerifyError::AsyncFailure {
                error: Some(error), ..
            } => Some(error.to_string()),
            // The resource path is not service text and must not reach a pattern.
            VerifyError::AsyncFailure { state, error: None, .. } => {
                Some(format!("state {state} without an error body"))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, VerifyError::NotFound { .. })
    }

    /// `true` when the remote outcome is unknown (timeout or cancellation).
    #[must_use]
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(
            self,
            VerifyError::Timeout { .. } | VerifyError::Canceled { .. }
        )
    }

    /// `true` for a definite negative answer from the service.
    #[must_use]
    pub fn is_service_negative(&self) -> bool {
        matches!(
            self,
            VerifyError::ImmediateRejection { .. } | VerifyError::AsyncFailure { .. }
        )
    }

    /// Short label used for metrics and reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::Setup { .. } => "setup",
            VerifyError::ImmediateRejection { .. } => "rejected",
            VerifyError::AsyncFailure { .. } => "failed",
            VerifyError::Timeout { .. } => "timeout",
            VerifyError::Canceled { .. } => "canceled",
            VerifyError::Transport { .. } => "transport",
            VerifyError::NotFound { .. } => "not_found",
            VerifyError::InvalidPollConfig { .. } => "invalid_poll_config",
            VerifyError::Decode { .. } => "decode",
            VerifyError::Verification { .. } => "verification",
            VerifyError::Config { .. } => "config",
        }
    }

    /// Wrap any error as a setup failure of `step`.
    pub fn setup(step: impl Into<String>, reason: impl ToString) -> Self {
        VerifyError::Setup {
            step: step.into(),
            reason: reason.to_string(),
        }
    }
}

fn correlation_suffix(correlation_id: &Option<String>) -> String {
    correlation_id
        .as_deref()
        .map(|id| format!(" (CorrelationID: {id})"))
        .unwrap_or_default()
}

fn error_suffix(error: &Option<CloudErrorBody>) -> String {
    error.as_ref().map(|e| format!(": {e}")).unwrap_or_default()
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

fn last_state_label(state: &Option<ProvisioningState>) -> String {
    state
        .as_ref()
        .map_or_else(|| "never observed".to_string(), ToString::to_string)
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
