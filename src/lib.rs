// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # hcpverify - asynchronous resource convergence verifier
//!
//! hcpverify drives end-to-end scenarios against a hosted OpenShift control
//! plane resource provider. Every mutation is accepted quickly and finishes
//! later, so each scenario step is:
//!
//! 1. **submit** a create, update, or delete ([`submitter`])
//! 2. **poll** the operation until it reaches a terminal provisioning state,
//!    times out, or is canceled ([`poller`], [`provisioning`])
//! 3. **verify** the terminal observation, or the synchronous rejection,
//!    against what the scenario expects ([`verifier`], [`patterns`])
//!
//! The [`harness`] runs scenarios in isolation: each one gets a unique
//! resource group ([`context`], [`naming`]), an overall deadline, and
//! reverse-order cleanup of everything it created.
//!
//! ## Modules
//!
//! - [`client`] - [`client::ResourceClient`] and its HTTP implementation
//! - [`resource`] - resource identity and paths
//! - [`models`] - request and response bodies
//! - [`errors`] - [`errors::VerifyError`]
//! - [`config`] - [`config::HarnessConfig`] from YAML and environment
//! - [`scenarios`] - built-in scenarios
//! - [`cleanup`] - removal of expired resource groups
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use hcpverify::client::ArmClient;
//! use hcpverify::config::HarnessConfig;
//! use hcpverify::harness::ScenarioHarness;
//! use hcpverify::scenarios::builtin_scenarios;
//! use std::sync::Arc;
//!
//! # async fn example() -> hcpverify::errors::Result<()> {
//! let config = HarnessConfig::load(None)?;
//! config.validate()?;
//! let client = ArmClient::new(&config.arm_endpoint, config.token.clone(), false)?;
//! let harness = ScenarioHarness::new(Arc::new(client), Arc::new(config));
//! for report in harness.run_all(&builtin_scenarios()).await {
//!     println!("{}: {}", report.scenario, report.message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod client;
pub mod cloud_error;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod harness;
pub mod http_errors;
pub mod metrics;
pub mod models;
pub mod naming;
pub mod params;
pub mod patterns;
pub mod poller;
pub mod provisioning;
pub mod resource;
pub mod retry;
pub mod scenarios;
pub mod submitter;
pub mod telemetry;
pub mod verifier;

#[cfg(test)]
pub(crate) mod fake_client;
