// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operation submission and wait-for-completion.
//!
//! [`OperationSubmitter::submit`] starts a mutation and hands back an
//! [`OperationHandle`]. [`OperationSubmitter::wait_for_completion`] consumes
//! that handle and drives a [`Poller`] with one of two fetch strategies:
//!
//! - **async operation** - the handle carries a status URL; the operation
//!   status document is polled and, on success of a create or update, the
//!   resource is read once more so verification sees the final representation
//! - **resource state** - no status URL; the resource's own
//!   `provisioningState` is polled. For deletes a NotFound is the success
//!   signal and any other state keeps polling.
//!
//! A delete the service completed synchronously (204, or 404 for a resource
//! that was already gone) is returned without polling.

use crate::client::{OperationHandle, OperationKind, ResourceClient};
use crate::errors::{Result, VerifyError};
use crate::metrics;
use crate::models::Observation;
use crate::poller::{PollConfig, PollResult, Poller};
use crate::provisioning::{classify, Classification, ProvisioningState};
use crate::resource::ResourceId;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A fully populated mutation, validated upstream by the caller.
#[derive(Debug, Clone)]
pub enum SubmitRequest {
    /// PUT of a complete resource body
    CreateOrUpdate { id: ResourceId, body: Value },
    /// PATCH with a partial body
    Update { id: ResourceId, patch: Value },
    Delete { id: ResourceId },
}

impl SubmitRequest {
    /// PUT request from any serializable model.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Decode`] when the model cannot be serialized.
    pub fn create_or_update<T: Serialize>(id: ResourceId, model: &T) -> Result<Self> {
        let body = serde_json::to_value(model).map_err(|e| VerifyError::Decode {
            what: format!("request body for {id}"),
            reason: e.to_string(),
        })?;
        Ok(Self::CreateOrUpdate { id, body })
    }

    #[must_use]
    pub fn update(id: ResourceId, patch: Value) -> Self {
        Self::Update { id, patch }
    }

    #[must_use]
    pub fn delete(id: ResourceId) -> Self {
        Self::Delete { id }
    }

    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateOrUpdate { .. } => OperationKind::Create,
            Self::Update { .. } => OperationKind::Update,
            Self::Delete { .. } => OperationKind::Delete,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ResourceId {
        match self {
            Self::CreateOrUpdate { id, .. } | Self::Update { id, .. } | Self::Delete { id } => id,
        }
    }
}

/// Starts mutations and waits for them to converge.
#[derive(Clone)]
pub struct OperationSubmitter {
    client: Arc<dyn ResourceClient>,
}

impl OperationSubmitter {
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<dyn ResourceClient> {
        &self.client
    }

    /// Submit a mutation.
    ///
    /// Acceptance only means asynchronous processing has started.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::ImmediateRejection`] for a synchronous 4xx, or
    /// [`VerifyError::Transport`] when the service could not be reached.
    pub async fn submit(&self, request: SubmitRequest) -> Result<OperationHandle> {
        let kind = request.kind();
        let id = request.id().clone();
        debug!(operation = %kind, resource = %id, "Submitting operation");

        let submitted = match &request {
            SubmitRequest::CreateOrUpdate { id, body } => self.client.create_or_update(id, body).await,
            SubmitRequest::Update { id, patch } => self.client.update(id, patch).await,
            SubmitRequest::Delete { id } => self.client.delete(id).await,
        };

        match submitted {
            Ok(handle) => {
                info!(
                    operation = %kind,
                    resource = %id,
                    async_operation = handle.status_url().is_some(),
                    "Operation accepted"
                );
                Ok(handle)
            }
            Err(e) => {
                warn!(operation = %kind, resource = %id, error = %e, "Operation not accepted");
                metrics::record_operation(
                    id.kind.as_str(),
                    kind.as_str(),
                    e.kind(),
                    std::time::Duration::ZERO,
                );
                Err(e)
            }
        }
    }

    /// Poll an accepted operation to a terminal state.
    ///
    /// The handle is consumed; a terminal failure is returned as a
    /// [`PollResult`], not an error.
    ///
    /// # Errors
    ///
    /// Returns the poller's timeout, cancellation or transport errors.
    pub async fn wait_for_completion(
        &self,
        handle: OperationHandle,
        config: PollConfig,
        cancel: &CancellationToken,
    ) -> Result<PollResult> {
        let started = Instant::now();
        let kind = handle.kind();
        let id = handle.resource().clone();

        if let Some(result) = Self::already_complete(&handle) {
            debug!(operation = %kind, resource = %id, "Operation completed synchronously");
            metrics::record_operation(id.kind.as_str(), kind.as_str(), "success", started.elapsed());
            return Ok(result);
        }

        let poller = Poller::new(config).for_operation(kind.as_str(), id.to_string());

        let handle = &handle;
        let polled = poller
            .poll_until_terminal(|| self.observe(handle), cancel)
            .await;

        let result = match polled {
            Ok(result) if result.is_success() && handle.status_url().is_some() => {
                self.with_final_representation(result, kind, &id).await
            }
            other => other,
        };

        let outcome = match &result {
            Ok(r) if r.is_success() => "success",
            Ok(_) => "failed",
            Err(e) => e.kind(),
        };
        metrics::record_operation(id.kind.as_str(), kind.as_str(), outcome, started.elapsed());
        result
    }

    /// Submit and wait in one call.
    ///
    /// # Errors
    ///
    /// Any error from [`OperationSubmitter::submit`] or
    /// [`OperationSubmitter::wait_for_completion`].
    pub async fn submit_and_wait(
        &self,
        request: SubmitRequest,
        config: PollConfig,
        cancel: &CancellationToken,
    ) -> Result<PollResult> {
        let handle = self.submit(request).await?;
        self.wait_for_completion(handle, config, cancel).await
    }

    /// A delete answered with 204 or 404 has nothing left to poll.
    fn already_complete(handle: &OperationHandle) -> Option<PollResult> {
        if handle.kind() != OperationKind::Delete || handle.status_url().is_some() {
            return None;
        }
        let state = handle.initial_state()?;
        let classification = classify(state);
        if classification != Classification::TerminalSuccess {
            return None;
        }
        Some(PollResult {
            observation: Observation {
                state: state.clone(),
                payload: Value::Null,
                error: None,
            },
            classification,
            attempts: 0,
            elapsed: std::time::Duration::ZERO,
        })
    }

    async fn observe(&self, handle: &OperationHandle) -> Result<Observation> {
        if handle.status_url().is_some() {
            let status = self.client.operation_status(handle).await?;
            let payload = serde_json::to_value(&status).unwrap_or(Value::Null);
            return Ok(Observation::from_operation(status, payload));
        }

        let fetched = self.client.get(handle.resource()).await;
        match (handle.kind(), fetched) {
            (OperationKind::Delete, Err(e)) if e.is_not_found() => Ok(Observation {
                state: ProvisioningState::Succeeded,
                payload: Value::Null,
                error: None,
            }),
            (OperationKind::Delete, Ok(payload)) => {
                let mut observation = Observation::from_resource(payload);
                // The resource still exists, so the delete has not finished.
                if classify(&observation.state) == Classification::TerminalSuccess {
                    observation.state = ProvisioningState::Deleting;
                }
                Ok(observation)
            }
            (_, fetched) => fetched.map(Observation::from_resource),
        }
    }

    async fn with_final_representation(
        &self,
        mut result: PollResult,
        kind: OperationKind,
        id: &ResourceId,
    ) -> Result<PollResult> {
        if kind == OperationKind::Delete {
            result.observation.payload = Value::Null;
            return Ok(result);
        }
        let payload = self.client.get(id).await?;
        debug!(resource = %id, "Fetched final representation");
        result.observation.payload = payload;
        Ok(result)
    }
}

#[cfg(test)]
#[path = "submitter_tests.rs"]
mod submitter_tests;
