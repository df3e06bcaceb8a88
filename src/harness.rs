// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Scenario harness.
//!
//! For each [`Scenario`] the harness:
//!
//! 1. allocates a [`ScenarioContext`] with collision-free names
//! 2. runs the scenario body under the overall scenario deadline; when the
//!    deadline passes the context's token is canceled so pollers abort
//! 3. deletes everything the scenario registered for cleanup, most recent
//!    first, unless cleanup is disabled
//! 4. reports the functional result and the cleanup result separately
//!
//! A cleanup failure is logged and listed in the report. It never turns a
//! passing scenario into a failing one.

use crate::client::ResourceClient;
use crate::config::HarnessConfig;
use crate::context::{CleanupEntry, ScenarioContext, StepTiming};
use crate::errors::{Result, VerifyError};
use crate::metrics;
use crate::provisioning::ProvisioningState;
use crate::submitter::SubmitRequest;
use crate::verifier::VerificationOutcome;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// One end-to-end verification scenario.
#[async_trait]
pub trait Scenario: Send + Sync {
    /// Stable, unique name used for selection, resource naming, and metrics.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Free-form labels such as `negative` or `positive`.
    fn labels(&self) -> &[&'static str] {
        &[]
    }

    /// Run the scenario body.
    ///
    /// `Ok` carries the verdict; `Err` means the scenario could not reach one
    /// (setup failure, timeout, transport error, ...).
    async fn run(&self, ctx: &ScenarioContext) -> Result<VerificationOutcome>;
}

/// A cleanup deletion that did not complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupFailure {
    pub resource: String,
    pub error: String,
}

/// Result of one scenario run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub scenario: String,
    pub resource_group: String,
    pub passed: bool,
    pub message: String,
    /// Error kind when the scenario ended in an error rather than a verdict
    pub error_kind: Option<String>,
    pub observed_state: Option<ProvisioningState>,
    pub duration: Duration,
    pub steps: Vec<StepTiming>,
    pub cleanup_skipped: bool,
    pub cleanup_failures: Vec<CleanupFailure>,
}

impl ScenarioReport {
    fn new(ctx: &ScenarioContext, result: Result<VerificationOutcome>, duration: Duration) -> Self {
        let (passed, message, error_kind, observed_state) = match result {
            Ok(outcome) => (outcome.success, outcome.message, None, outcome.observed_state),
            Err(e) => {
                let state = match &e {
                    VerifyError::AsyncFailure { state, .. } => Some(state.clone()),
                    VerifyError::Timeout { last_state, .. } => last_state.clone(),
                    _ => None,
                };
                (false, e.to_string(), Some(e.kind().to_string()), state)
            }
        };
        Self {
            scenario: ctx.scenario().to_string(),
            resource_group: ctx.scope().resource_group.clone(),
            passed,
            message,
            error_kind,
            observed_state,
            duration,
            steps: ctx.steps(),
            cleanup_skipped: false,
            cleanup_failures: Vec::new(),
        }
    }

    /// `true` when cleanup ran and every deletion completed.
    #[must_use]
    pub fn cleanup_clean(&self) -> bool {
        !self.cleanup_skipped && self.cleanup_failures.is_empty()
    }
}

pub struct ScenarioHarness {
    client: Arc<dyn ResourceClient>,
    config: Arc<HarnessConfig>,
    shutdown: CancellationToken,
}

impl ScenarioHarness {
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>, config: Arc<HarnessConfig>) -> Self {
        Self {
            client,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancel every running scenario when `shutdown` fires.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one scenario to a report. Never fails; errors end up in the report.
    pub async fn run(&self, scenario: &dyn Scenario) -> ScenarioReport {
        let cancel = self.shutdown.child_token();
        let ctx = ScenarioContext::new(
            scenario.name(),
            Arc::clone(&self.client),
            Arc::clone(&self.config),
            cancel.clone(),
        );
        info!(
            scenario = scenario.name(),
            resource_group = %ctx.scope().resource_group,
            "Scenario started"
        );

        let start = Instant::now();
        let deadline = self.config.scenario_deadline();
        let watchdog = async {
            tokio::time::sleep(deadline).await;
            warn!(scenario = scenario.name(), deadline = ?deadline, "Scenario deadline exceeded, canceling");
            cancel.cancel();
            std::future::pending::<Result<VerificationOutcome>>().await
        };
        let result = tokio::select! {
            result = scenario.run(&ctx) => result,
            result = watchdog => result,
        };
        let duration = start.elapsed();

        let mut report = ScenarioReport::new(&ctx, result, duration);
        metrics::record_scenario(scenario.name(), report.passed, duration);
        if report.passed {
            info!(scenario = scenario.name(), duration = ?duration, "Scenario passed");
        } else {
            error!(scenario = scenario.name(), duration = ?duration, message = %report.message, "Scenario failed");
        }

        if self.config.skip_cleanup {
            let pending = ctx.take_cleanup();
            warn!(
                scenario = scenario.name(),
                resources = pending.len(),
                "Cleanup disabled, leaving resources in place"
            );
            report.cleanup_skipped = true;
        } else {
            report.cleanup_failures = self.cleanup(&ctx).await;
        }
        report
    }

    /// Run scenarios concurrently, at most `parallelism` at a time.
    ///
    /// Reports come back in input order.
    pub async fn run_all(&self, scenarios: &[Arc<dyn Scenario>]) -> Vec<ScenarioReport> {
        let parallelism = self.config.parallelism.max(1);
        info!(scenarios = scenarios.len(), parallelism, "Running scenarios");
        stream::iter(scenarios)
            .map(|scenario| self.run(scenario.as_ref()))
            .buffered(parallelism)
            .collect()
            .await
    }

    async fn cleanup(&self, ctx: &ScenarioContext) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        // The scenario token may already be canceled by the deadline.
        let cancel = CancellationToken::new();

        for CleanupEntry { id, timeout } in ctx.take_cleanup() {
            info!(scenario = ctx.scenario(), resource = %id, "Cleaning up");
            let outcome = ctx
                .submitter()
                .submit_and_wait(SubmitRequest::delete(id.clone()), timeout, &cancel)
                .await
                .and_then(|result| result.into_success("delete", &id.to_string()));

            if let Err(e) = outcome {
                warn!(scenario = ctx.scenario(), resource = %id, error = %e, "Cleanup failed");
                metrics::record_cleanup_failure(id.kind.as_str());
                failures.push(CleanupFailure {
                    resource: id.to_string(),
                    error: e.to_string(),
                });
            }
        }
        failures
    }
}

#[cfg(test)]
#[path = "harness_tests.rs"]
mod harness_tests;
