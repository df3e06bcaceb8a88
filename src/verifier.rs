// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Outcome verification.
//!
//! A scenario states what it expects as an [`Expectation`] and hands the
//! terminal observation (or the error that replaced it) to [`verify_result`].
//! The verifier never swallows an error: every failed check produces a
//! message naming both the expectation and what was observed.
//!
//! Negative scenarios use [`Expectation::Failure`], which accepts either a
//! synchronous rejection or a terminal failure state as long as the service
//! message matches the pattern. Timeouts, cancellations, and transport errors
//! never satisfy it because they say nothing about the service's answer.

use crate::errors::{Result, VerifyError};
use crate::models::Observation;
use crate::patterns::ErrorPattern;
use crate::poller::PollResult;
use crate::provisioning::{classify, Classification, ProvisioningState};
use serde_json::Value;
use std::fmt;

/// Check applied to one JSON pointer of the final resource.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCheck {
    Equals(Value),
    /// Present and not `null`
    Present,
    /// Missing or `null`
    Unset,
    /// String containing the text, or array containing it as an element
    Contains(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldAssertion {
    /// RFC 6901 pointer, e.g. `/properties/autoScaling/min`
    pub pointer: String,
    pub check: FieldCheck,
}

impl FieldAssertion {
    pub fn equals(pointer: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            pointer: pointer.into(),
            check: FieldCheck::Equals(value.into()),
        }
    }

    pub fn present(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            check: FieldCheck::Present,
        }
    }

    pub fn unset(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            check: FieldCheck::Unset,
        }
    }

    pub fn contains(pointer: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            check: FieldCheck::Contains(text.into()),
        }
    }

    /// `None` when the assertion holds, otherwise a mismatch description.
    fn check(&self, payload: &Value) -> Option<String> {
        let actual = payload.pointer(&self.pointer).filter(|v| !v.is_null());
        let observed = actual.map_or_else(|| "<unset>".to_string(), Value::to_string);
        let holds = match &self.check {
            FieldCheck::Equals(expected) => actual == Some(expected),
            FieldCheck::Present => actual.is_some(),
            FieldCheck::Unset => actual.is_none(),
            FieldCheck::Contains(text) => match actual {
                Some(Value::String(s)) => s.contains(text.as_str()),
                Some(Value::Array(items)) => items.iter().any(|i| i.as_str() == Some(text.as_str())),
                _ => false,
            },
        };
        if holds {
            return None;
        }
        let expected = match &self.check {
            FieldCheck::Equals(v) => v.to_string(),
            FieldCheck::Present => "<present>".to_string(),
            FieldCheck::Unset => "<unset>".to_string(),
            FieldCheck::Contains(text) => format!("containing {text:?}"),
        };
        Some(format!(
            "{}: expected {expected}, observed {observed}",
            self.pointer
        ))
    }
}

/// What a scenario expects from one operation.
#[derive(Debug, Clone)]
pub enum Expectation {
    /// Exact terminal state
    State(ProvisioningState),
    /// Rejection or terminal failure whose message matches the pattern
    Failure(ErrorPattern),
    /// `Succeeded` and every field assertion holds on the final resource
    Fields(Vec<FieldAssertion>),
    All(Vec<Expectation>),
}

impl Expectation {
    #[must_use]
    pub fn succeeded() -> Self {
        Self::State(ProvisioningState::Succeeded)
    }

    #[must_use]
    pub fn failure(pattern: &ErrorPattern) -> Self {
        Self::Failure(pattern.clone())
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::State(state) => write!(f, "state {state}"),
            Expectation::Failure(pattern) => write!(f, "failure matching {pattern}"),
            Expectation::Fields(assertions) => {
                write!(f, "Succeeded with {} field assertion(s)", assertions.len())
            }
            Expectation::All(all) => {
                let parts: Vec<String> = all.iter().map(ToString::to_string).collect();
                write!(f, "all of [{}]", parts.join(", "))
            }
        }
    }
}

/// Pass/fail verdict for one scenario attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    pub success: bool,
    pub message: String,
    /// `None` when the operation never reached a provisioning state
    /// (rejection, timeout, transport failure)
    pub observed_state: Option<ProvisioningState>,
}

impl VerificationOutcome {
    #[must_use]
    pub fn pass(message: impl Into<String>, observed_state: Option<ProvisioningState>) -> Self {
        Self {
            success: true,
            message: message.into(),
            observed_state,
        }
    }

    #[must_use]
    pub fn fail(message: impl Into<String>, observed_state: Option<ProvisioningState>) -> Self {
        Self {
            success: false,
            message: message.into(),
            observed_state,
        }
    }

    /// # Errors
    ///
    /// Returns [`VerifyError::Verification`] carrying the message when the
    /// outcome is a failure.
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(VerifyError::Verification {
                message: self.message,
            })
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.success { "PASS" } else { "FAIL" };
        write!(f, "{verdict}: {}", self.message)
    }
}

/// Verify a terminal observation.
#[must_use]
pub fn verify(observed: &Observation, expectation: &Expectation) -> VerificationOutcome {
    let state = Some(observed.state.clone());
    match expectation {
        Expectation::State(expected) => {
            if &observed.state == expected {
                VerificationOutcome::pass(format!("reached expected state {expected}"), state)
            } else {
                VerificationOutcome::fail(
                    format!("expected state {expected}, observed {}", observed.state),
                    state,
                )
            }
        }
        Expectation::Failure(pattern) => {
            if classify(&observed.state) != Classification::TerminalFailure {
                return VerificationOutcome::fail(
                    format!(
                        "expected failure matching {pattern}, observed state {}",
                        observed.state
                    ),
                    state,
                );
            }
            let message = observed.error.as_ref().map_or_else(
                || format!("state {} without an error body", observed.state),
                ToString::to_string,
            );
            match_message(pattern, &message, state)
        }
        Expectation::Fields(assertions) => {
            if observed.state != ProvisioningState::Succeeded {
                return VerificationOutcome::fail(
                    format!(
                        "expected state Succeeded before field checks, observed {}",
                        observed.state
                    ),
                    state,
                );
            }
            let mismatches: Vec<String> = assertions
                .iter()
                .filter_map(|a| a.check(&observed.payload))
                .collect();
            if mismatches.is_empty() {
                VerificationOutcome::pass(
                    format!("{} field assertion(s) hold", assertions.len()),
                    state,
                )
            } else {
                VerificationOutcome::fail(mismatches.join("; "), state)
            }
        }
        Expectation::All(all) => combine(all.iter().map(|e| verify(observed, e)), state),
    }
}

/// Verify the outcome of an operation, including a synchronous rejection.
#[must_use]
pub fn verify_result(result: &Result<Observation>, expectation: &Expectation) -> VerificationOutcome {
    verify_either(result.as_ref(), expectation)
}

/// Same as [`verify_result`] for a submit-and-wait outcome.
#[must_use]
pub fn verify_poll_result(
    result: &Result<PollResult>,
    expectation: &Expectation,
) -> VerificationOutcome {
    verify_either(result.as_ref().map(|r| &r.observation), expectation)
}

fn verify_either(
    result: std::result::Result<&Observation, &VerifyError>,
    expectation: &Expectation,
) -> VerificationOutcome {
    let error = match result {
        Ok(observed) => return verify(observed, expectation),
        Err(error) => error,
    };
    let state = match error {
        VerifyError::AsyncFailure { state, .. } => Some(state.clone()),
        VerifyError::Timeout { last_state, .. } => last_state.clone(),
        _ => None,
    };

    match expectation {
        Expectation::Failure(pattern) => match error.service_message() {
            Some(message) => match_message(pattern, &message, state),
            None => VerificationOutcome::fail(
                format!(
                    "expected failure matching {pattern}, got {} error: {error}",
                    error.kind()
                ),
                state,
            ),
        },
        Expectation::All(all) => combine(
            all.iter().map(|e| verify_either(Err(error), e)),
            state,
        ),
        other => VerificationOutcome::fail(format!("expected {other}, got error: {error}"), state),
    }
}

fn match_message(
    pattern: &ErrorPattern,
    message: &str,
    state: Option<ProvisioningState>,
) -> VerificationOutcome {
    if pattern.is_match(message) {
        VerificationOutcome::pass(format!("failure matched {pattern}: {message}"), state)
    } else {
        VerificationOutcome::fail(
            format!("expected failure matching {pattern}, observed message: {message}"),
            state,
        )
    }
}

fn combine(
    outcomes: impl Iterator<Item = VerificationOutcome>,
    state: Option<ProvisioningState>,
) -> VerificationOutcome {
    let (passed, failed): (Vec<_>, Vec<_>) = outcomes.partition(|o| o.success);
    if failed.is_empty() {
        let messages: Vec<String> = passed.into_iter().map(|o| o.message).collect();
        VerificationOutcome::pass(messages.join("; "), state)
    } else {
        let messages: Vec<String> = failed.into_iter().map(|o| o.message).collect();
        VerificationOutcome::fail(messages.join("; "), state)
    }
}

/// Compare the model returned by a finished operation with a fresh GET.
///
/// `systemData` is ignored at the top level because it changes on every
/// write. The failure message lists the JSON pointers that differ.
#[must_use]
pub fn compare_operation_result(get_model: &Value, operation_result: &Value) -> VerificationOutcome {
    let state = crate::models::provisioning_state_of(get_model);
    let mut differences = Vec::new();
    diff("", get_model, operation_result, true, &mut differences);
    if differences.is_empty() {
        VerificationOutcome::pass("operation result matches GET", state)
    } else {
        VerificationOutcome::fail(
            format!(
                "operation result differs from GET at {}",
                differences.join(", ")
            ),
            state,
        )
    }
}

fn diff(path: &str, left: &Value, right: &Value, top_level: bool, out: &mut Vec<String>) {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            let mut keys: Vec<&String> = l.keys().chain(r.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                if top_level && key == "systemData" {
                    continue;
                }
                let child = format!("{path}/{}", escape_pointer(key));
                match (l.get(key), r.get(key)) {
                    (Some(a), Some(b)) => diff(&child, a, b, false, out),
                    _ => out.push(child),
                }
            }
        }
        (Value::Array(l), Value::Array(r)) if l.len() == r.len() => {
            for (i, (a, b)) in l.iter().zip(r).enumerate() {
                diff(&format!("{path}/{i}"), a, b, false, out);
            }
        }
        _ if left == right => {}
        _ => out.push(if path.is_empty() { "/".to_string() } else { path.to_string() }),
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
#[path = "verifier_tests.rs"]
mod verifier_tests;
