// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-scenario context.
//!
//! Every scenario receives its own [`ScenarioContext`] holding:
//! - the shared [`ResourceClient`] (constructed once per runner, never global)
//! - a fresh scope whose resource group name is unique to this run
//! - the cancellation token the harness fires when the scenario deadline passes
//! - the cleanup list and step timings collected while the scenario runs
//!
//! Mutations go through [`ScenarioContext::create`], [`ScenarioContext::update`]
//! and [`ScenarioContext::delete`], which register and unregister cleanup as a
//! side effect. A cleanup entry is added only once a create has been accepted,
//! so a rejected create leaves nothing to tear down.

use crate::client::ResourceClient;
use crate::config::HarnessConfig;
use crate::constants::{
    CREATED_BY_TAG, CREATED_BY_VALUE, DELETE_AFTER_TAG, MAX_RESOURCE_GROUP_NAME_LEN,
    RANDOM_SUFFIX_LEN,
};
use crate::errors::{Result, VerifyError};
use crate::metrics;
use crate::models::ResourceGroup;
use crate::naming::{random_suffix, suffix_name};
use crate::poller::{PollConfig, PollResult};
use crate::resource::{ResourceId, Scope};
use crate::submitter::{OperationSubmitter, SubmitRequest};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Wall-clock record of one named step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTiming {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub success: bool,
}

/// A resource to delete when the scenario finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupEntry {
    pub id: ResourceId,
    pub timeout: PollConfig,
}

pub struct ScenarioContext {
    scenario: String,
    run_id: String,
    client: Arc<dyn ResourceClient>,
    submitter: OperationSubmitter,
    config: Arc<HarnessConfig>,
    scope: Scope,
    cancel: CancellationToken,
    cleanup: Mutex<Vec<CleanupEntry>>,
    steps: Mutex<Vec<StepTiming>>,
}

impl ScenarioContext {
    /// Context with a resource group name unique to this run.
    ///
    /// Nothing is created remotely until a scenario asks for it.
    #[must_use]
    pub fn new(
        scenario: &str,
        client: Arc<dyn ResourceClient>,
        config: Arc<HarnessConfig>,
        cancel: CancellationToken,
    ) -> Self {
        let run_id = random_suffix(RANDOM_SUFFIX_LEN);
        let base = format!("{}-{scenario}", config.resource_group_prefix);
        let resource_group = suffix_name(&base, &run_id, MAX_RESOURCE_GROUP_NAME_LEN);
        let scope = Scope::new(config.subscription_id.clone(), resource_group);
        Self {
            scenario: scenario.to_string(),
            run_id,
            submitter: OperationSubmitter::new(Arc::clone(&client)),
            client,
            config,
            scope,
            cancel,
            cleanup: Mutex::new(Vec::new()),
            steps: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub fn client(&self) -> &Arc<dyn ResourceClient> {
        &self.client
    }

    #[must_use]
    pub fn submitter(&self) -> &OperationSubmitter {
        &self.submitter
    }

    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// This scenario's own resource group scope.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.config.location
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// `base` suffixed with this run's id, within `max_len`.
    #[must_use]
    pub fn name(&self, base: &str, max_len: usize) -> String {
        suffix_name(base, &self.run_id, max_len)
    }

    /// Scope and name of the pre-provisioned cluster.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Setup`] when no target cluster is configured.
    pub fn target_cluster(&self) -> Result<(Scope, String)> {
        let target = self.config.target_cluster.as_ref().ok_or_else(|| {
            VerifyError::setup(
                "locate target cluster",
                "no targetCluster configured; node pool scenarios need a running cluster",
            )
        })?;
        Ok((
            Scope::new(self.config.subscription_id.clone(), target.resource_group.clone()),
            target.cluster_name.clone(),
        ))
    }

    /// Poll configuration for `timeout_secs` with the configured interval.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidPollConfig`] for a timeout not above the interval.
    pub fn poll_config(&self, timeout_secs: u64) -> Result<PollConfig> {
        self.config.poll_config(timeout_secs)
    }

    /// Create this scenario's resource group, tagged for expiry.
    ///
    /// # Errors
    ///
    /// Any failure is reported as [`VerifyError::Setup`].
    pub async fn create_resource_group(&self) -> Result<()> {
        let id = ResourceId::resource_group(&self.scope);
        let body = ResourceGroup {
            id: None,
            name: None,
            location: self.config.location.clone(),
            tags: resource_group_tags(Utc::now(), self.config.resource_group_expiry_secs)?,
        };
        let request = SubmitRequest::create_or_update(id, &body)?;
        let timeout = self.poll_config(self.config.timeouts.resource_group_secs)?;

        self.create_request(request, timeout)
            .await
            .and_then(|result| result.into_success("create", &self.scope.resource_group))
            .map(|_| ())
            .map_err(|e| VerifyError::setup(format!("create resource group {}", self.scope.resource_group), e))
    }

    /// Submit a PUT, register cleanup once accepted, and wait.
    ///
    /// # Errors
    ///
    /// A rejection, timeout, cancellation, or transport error. A terminal
    /// failure is an `Ok` [`PollResult`].
    pub async fn create(&self, id: &ResourceId, body: &Value, timeout: PollConfig) -> Result<PollResult> {
        let request = SubmitRequest::CreateOrUpdate {
            id: id.clone(),
            body: body.clone(),
        };
        self.create_request(request, timeout).await
    }

    async fn create_request(&self, request: SubmitRequest, timeout: PollConfig) -> Result<PollResult> {
        let id = request.id().clone();
        let delete_timeout = self.delete_timeout()?;
        let handle = self.submitter.submit(request).await?;
        self.register_cleanup(id, delete_timeout);
        self.submitter
            .wait_for_completion(handle, timeout, &self.cancel)
            .await
    }

    /// Submit a PATCH and wait.
    ///
    /// # Errors
    ///
    /// Same as [`ScenarioContext::create`].
    pub async fn update(&self, id: &ResourceId, patch: Value, timeout: PollConfig) -> Result<PollResult> {
        self.submitter
            .submit_and_wait(SubmitRequest::update(id.clone(), patch), timeout, &self.cancel)
            .await
    }

    /// Delete and wait. A successful delete drops the cleanup entry.
    ///
    /// # Errors
    ///
    /// Same as [`ScenarioContext::create`].
    pub async fn delete(&self, id: &ResourceId, timeout: PollConfig) -> Result<PollResult> {
        let result = self
            .submitter
            .submit_and_wait(SubmitRequest::delete(id.clone()), timeout, &self.cancel)
            .await?;
        if result.is_success() {
            self.lock_cleanup().retain(|entry| &entry.id != id);
        }
        Ok(result)
    }

    /// Fresh read of a resource.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::NotFound`] or a transport error.
    pub async fn get(&self, id: &ResourceId) -> Result<Value> {
        self.client.get(id).await
    }

    /// Register `id` for deletion when the scenario ends.
    pub fn register_cleanup(&self, id: ResourceId, timeout: PollConfig) {
        let mut cleanup = self.lock_cleanup();
        if cleanup.iter().any(|entry| entry.id == id) {
            return;
        }
        debug!(scenario = %self.scenario, resource = %id, "Registered cleanup");
        cleanup.push(CleanupEntry { id, timeout });
    }

    /// Remove and return registered cleanup, most recent first.
    pub fn take_cleanup(&self) -> Vec<CleanupEntry> {
        let mut entries = std::mem::take(&mut *self.lock_cleanup());
        entries.reverse();
        entries
    }

    /// Run `fut` as a named step, recording its timing.
    ///
    /// # Errors
    ///
    /// Returns whatever `fut` returns.
    pub async fn step<T, F>(&self, name: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        info!(scenario = %self.scenario, step = name, "Step started");
        let started_at = Utc::now();
        let start = Instant::now();
        let result = fut.await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => info!(scenario = %self.scenario, step = name, duration = ?duration, "Step finished"),
            Err(e) => warn!(scenario = %self.scenario, step = name, duration = ?duration, error = %e, "Step failed"),
        }
        metrics::record_step(&self.scenario, name, duration);
        self.steps
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(StepTiming {
                name: name.to_string(),
                started_at,
                duration,
                success: result.is_ok(),
            });
        result
    }

    #[must_use]
    pub fn steps(&self) -> Vec<StepTiming> {
        self.steps
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn delete_timeout(&self) -> Result<PollConfig> {
        self.poll_config(self.config.timeouts.delete_secs)
    }

    fn lock_cleanup(&self) -> MutexGuard<'_, Vec<CleanupEntry>> {
        self.cleanup
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Tags stamped on every resource group the harness creates.
///
/// # Errors
///
/// Returns [`VerifyError::Config`] when `now + expiry_secs` is not a
/// representable time.
pub fn resource_group_tags(
    now: DateTime<Utc>,
    expiry_secs: i64,
) -> Result<BTreeMap<String, String>> {
    let delete_after = TimeDelta::try_seconds(expiry_secs)
        .and_then(|expiry| now.checked_add_signed(expiry))
        .ok_or_else(|| VerifyError::Config {
            reason: format!("resource group expiry of {expiry_secs} seconds is out of range"),
        })?;
    Ok(BTreeMap::from([
        (
            DELETE_AFTER_TAG.to_string(),
            delete_after.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (CREATED_BY_TAG.to_string(), CREATED_BY_VALUE.to_string()),
    ]))
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
