// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Harness configuration.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then environment variables. The result is checked by
//! [`HarnessConfig::validate`] before any request is sent.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `CUSTOMER_SUBSCRIPTION` | `subscriptionId` |
//! | `AZURE_TENANT_ID` | `tenantId` |
//! | `ENTRA_CLIENT_ID` | `entraClientId` |
//! | `LOCATION` | `location` |
//! | `AROHCP_ENV` | `environment` |
//! | `FRONTEND_ADDRESS` | endpoint when `environment` is `development` |
//! | `ARM_ENDPOINT` | `armEndpoint` |
//! | `ARM_TOKEN` | `token` |
//! | `ARO_E2E_SKIP_CLEANUP` | `skipCleanup` |
//! | `ARTIFACT_DIR` | `artifactDir` |
//! | `E2E_PARALLELISM` | `parallelism` |

use crate::constants::{
    CLUSTER_CREATE_TIMEOUT_SECS, DEFAULT_ARM_ENDPOINT, DEFAULT_DEVELOPMENT_ENDPOINT,
    DEFAULT_PARALLELISM, DELETE_TIMEOUT_SECS, MAX_POLL_TIMEOUT_SECS,
    MAX_RESOURCE_GROUP_EXPIRATION_SECS, NODE_POOL_TIMEOUT_SECS, RESOURCE_GROUP_EXPIRATION_SECS,
    RESOURCE_GROUP_TIMEOUT_SECS, SCENARIO_DEADLINE_SECS, STANDARD_POLL_INTERVAL_SECS,
};
use crate::errors::{Result, VerifyError};
use crate::poller::PollConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment name that targets a locally forwarded frontend.
pub const DEVELOPMENT_ENVIRONMENT: &str = "development";

pub const DEFAULT_RESOURCE_GROUP_PREFIX: &str = "hcp-e2e";
pub const DEFAULT_LOCATION: &str = "westus3";

/// Polling cadence and timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Timeouts {
    pub poll_interval_secs: u64,
    pub cluster_secs: u64,
    pub node_pool_secs: u64,
    pub delete_secs: u64,
    pub resource_group_secs: u64,
    /// Overall budget per scenario; cancels in-flight polls when exceeded
    pub scenario_deadline_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_interval_secs: STANDARD_POLL_INTERVAL_SECS,
            cluster_secs: CLUSTER_CREATE_TIMEOUT_SECS,
            node_pool_secs: NODE_POOL_TIMEOUT_SECS,
            delete_secs: DELETE_TIMEOUT_SECS,
            resource_group_secs: RESOURCE_GROUP_TIMEOUT_SECS,
            scenario_deadline_secs: SCENARIO_DEADLINE_SECS,
        }
    }
}

/// Pre-provisioned cluster that node pool scenarios attach to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCluster {
    pub resource_group: String,
    pub cluster_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HarnessConfig {
    pub subscription_id: String,
    pub tenant_id: Option<String>,
    /// Registered Entra application used as a valid audience by external
    /// auth scenarios
    pub entra_client_id: Option<String>,
    pub location: String,
    /// `development` targets a local frontend without authentication
    pub environment: String,
    pub arm_endpoint: String,
    /// Bearer token; never written back out
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Accept self-signed certificates (local frontends only)
    pub accept_invalid_certs: bool,
    pub resource_group_prefix: String,
    pub skip_cleanup: bool,
    pub artifact_dir: Option<PathBuf>,
    pub parallelism: usize,
    pub resource_group_expiry_secs: i64,
    pub target_cluster: Option<TargetCluster>,
    pub timeouts: Timeouts,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            subscription_id: String::new(),
            tenant_id: None,
            entra_client_id: None,
            location: DEFAULT_LOCATION.to_string(),
            environment: String::new(),
            arm_endpoint: DEFAULT_ARM_ENDPOINT.to_string(),
            token: None,
            accept_invalid_certs: false,
            resource_group_prefix: DEFAULT_RESOURCE_GROUP_PREFIX.to_string(),
            skip_cleanup: false,
            artifact_dir: None,
            parallelism: DEFAULT_PARALLELISM,
            resource_group_expiry_secs: RESOURCE_GROUP_EXPIRATION_SECS,
            target_cluster: None,
            timeouts: Timeouts::default(),
        }
    }
}

impl HarnessConfig {
    /// Defaults, then `path` if given, then the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Config`] when the file cannot be read or parsed,
    /// or an environment variable is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`VerifyError::Config`] when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| VerifyError::Config {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        let config: Self = serde_yaml::from_str(&contents).map_err(|e| VerifyError::Config {
            reason: format!("failed to parse {}: {e}", path.display()),
        })?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Config`] for an unparseable `E2E_PARALLELISM`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("CUSTOMER_SUBSCRIPTION") {
            self.subscription_id = v;
        }
        if let Some(v) = var("AZURE_TENANT_ID") {
            self.tenant_id = Some(v);
        }
        if let Some(v) = var("ENTRA_CLIENT_ID") {
            self.entra_client_id = Some(v);
        }
        if let Some(v) = var("LOCATION") {
            self.location = v;
        }
        if let Some(v) = var("AROHCP_ENV") {
            self.environment = v;
        }
        if let Some(v) = var("ARM_ENDPOINT") {
            self.arm_endpoint = v;
        }
        if self.is_development() {
            self.arm_endpoint =
                var("FRONTEND_ADDRESS").unwrap_or_else(|| DEFAULT_DEVELOPMENT_ENDPOINT.to_string());
        }
        if let Some(v) = var("ARM_TOKEN") {
            self.token = Some(v);
        }
        if let Some(v) = var("ARO_E2E_SKIP_CLEANUP") {
            self.skip_cleanup = is_truthy(&v);
        }
        if let Some(v) = var("ARTIFACT_DIR") {
            self.artifact_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = var("E2E_PARALLELISM") {
            self.parallelism = v.trim().parse().map_err(|e| VerifyError::Config {
                reason: format!("E2E_PARALLELISM must be a positive integer, got '{v}': {e}"),
            })?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEVELOPMENT_ENVIRONMENT)
    }

    /// Check everything a run needs.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Config`] naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(VerifyError::Config {
                reason: reason.to_string(),
            })
        };

        if self.subscription_id.trim().is_empty() {
            return invalid("subscription id is required (CUSTOMER_SUBSCRIPTION)");
        }
        if self.location.trim().is_empty() {
            return invalid("location is required (LOCATION)");
        }
        if url::Url::parse(&self.arm_endpoint).is_err() {
            return invalid(&format!("invalid resource manager endpoint '{}'", self.arm_endpoint));
        }
        if !self.is_development() && self.token.is_none() {
            return invalid("a bearer token is required outside development (ARM_TOKEN)");
        }
        if self.parallelism == 0 {
            return invalid("parallelism must be at least 1");
        }
        if self.resource_group_expiry_secs <= 0 {
            return invalid("resource group expiry must be positive");
        }
        if self.resource_group_expiry_secs > MAX_RESOURCE_GROUP_EXPIRATION_SECS {
            return invalid(&format!(
                "resource group expiry must not exceed {MAX_RESOURCE_GROUP_EXPIRATION_SECS} seconds"
            ));
        }
        if self.resource_group_prefix.trim().is_empty() {
            return invalid("resource group prefix must not be empty");
        }
        if self.timeouts.scenario_deadline_secs == 0 {
            return invalid("scenario deadline must be positive");
        }
        if self.timeouts.scenario_deadline_secs > MAX_POLL_TIMEOUT_SECS {
            return invalid(&format!(
                "scenario deadline must not exceed {MAX_POLL_TIMEOUT_SECS} seconds"
            ));
        }
        for timeout in [
            self.timeouts.cluster_secs,
            self.timeouts.node_pool_secs,
            self.timeouts.delete_secs,
            self.timeouts.resource_group_secs,
        ] {
            self.poll_config(timeout)?;
        }
        Ok(())
    }

    /// Poll configuration with the configured interval and `timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidPollConfig`] when the timeout does not
    /// exceed the interval.
    pub fn poll_config(&self, timeout_secs: u64) -> Result<PollConfig> {
        PollConfig::new(
            Duration::from_secs(self.timeouts.poll_interval_secs),
            Duration::from_secs(timeout_secs),
        )
    }

    #[must_use]
    pub fn scenario_deadline(&self) -> Duration {
        Duration::from_secs(self.timeouts.scenario_deadline_secs)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
