// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource manager client contract and its HTTP implementation.
//!
//! [`ResourceClient`] is the only interface the harness needs from the service
//! under test. [`ArmClient`] implements it over `reqwest`; tests substitute an
//! in-memory implementation.
//!
//! # Long-running operations
//!
//! Mutations return an [`OperationHandle`]. When the service answers with an
//! `Azure-AsyncOperation` header, or failing that a `Location` header, the
//! handle carries that status URL and the poller follows it; otherwise the
//! resource's own `provisioningState` is polled.
//!
//! A `Location` URL answers 202 while the operation runs and 200 or 204 once
//! it has finished, instead of returning a status document.
//!
//! # Errors
//!
//! Only a 4xx other than 401, 403, 404, 408 and 429 on submit is a
//! [`VerifyError::ImmediateRejection`]. A refused credential, a throttled or
//! failing gateway, and any unexpected status are [`VerifyError::Transport`].

use crate::cloud_error::CloudErrorBody;
use crate::constants::{
    HEADER_ASYNC_OPERATION, HEADER_CORRELATION_ID, HEADER_LOCATION, HTTP_REQUEST_TIMEOUT_SECS,
};
use crate::errors::{Result, VerifyError};
use crate::http_errors::{classify_status, map_http_error_to_reason, ResponseClass};
use crate::models::{provisioning_state_of, OperationStatus};
use crate::provisioning::ProvisioningState;
use crate::resource::ResourceId;
use crate::retry::{http_backoff, retry_http_call};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Kind of mutation an [`OperationHandle`] tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to an in-flight asynchronous mutation.
///
/// Deliberately not `Clone`: a handle is consumed by exactly one wait.
#[derive(Debug)]
pub struct OperationHandle {
    kind: OperationKind,
    resource: ResourceId,
    status_url: Option<Url>,
    initial_state: Option<ProvisioningState>,
}

impl OperationHandle {
    #[must_use]
    pub fn new(kind: OperationKind, resource: ResourceId) -> Self {
        Self {
            kind,
            resource,
            status_url: None,
            initial_state: None,
        }
    }

    #[must_use]
    pub fn with_status_url(mut self, url: Url) -> Self {
        self.status_url = Some(url);
        self
    }

    #[must_use]
    pub fn with_initial_state(mut self, state: ProvisioningState) -> Self {
        self.initial_state = Some(state);
        self
    }

    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    #[must_use]
    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    #[must_use]
    pub fn status_url(&self) -> Option<&Url> {
        self.status_url.as_ref()
    }

    /// Provisioning state reported in the submit response, if any.
    #[must_use]
    pub fn initial_state(&self) -> Option<&ProvisioningState> {
        self.initial_state.as_ref()
    }
}

/// Operations the harness requires from the service under test.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// PUT a full resource body.
    async fn create_or_update(&self, id: &ResourceId, body: &Value) -> Result<OperationHandle>;

    /// PATCH a partial resource body.
    async fn update(&self, id: &ResourceId, patch: &Value) -> Result<OperationHandle>;

    /// GET a resource. A missing resource is [`VerifyError::NotFound`].
    async fn get(&self, id: &ResourceId) -> Result<Value>;

    async fn delete(&self, id: &ResourceId) -> Result<OperationHandle>;

    /// List every member of a collection, following `nextLink`.
    async fn list(&self, collection: &ResourceId) -> Result<Vec<Value>>;

    /// Fetch the status document behind `handle`'s async operation URL.
    async fn operation_status(&self, handle: &OperationHandle) -> Result<OperationStatus>;
}

/// Raw response captured before interpretation.
struct RawResponse {
    status: u16,
    async_operation: Option<String>,
    correlation_id: Option<String>,
    body: String,
}

/// HTTP implementation of [`ResourceClient`] against a resource manager endpoint.
#[derive(Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArmClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl ArmClient {
    /// Build a client for `endpoint`.
    ///
    /// `accept_invalid_certs` is only meant for development frontends with
    /// self-signed certificates.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Config`] when the endpoint is not a valid URL or
    /// the HTTP client cannot be built.
    pub fn new(endpoint: &str, token: Option<String>, accept_invalid_certs: bool) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| VerifyError::Config {
            reason: format!("invalid endpoint '{endpoint}': {e}"),
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| VerifyError::Config {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            endpoint,
            token,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url_for(&self, id: &ResourceId) -> Result<Url> {
        let mut url = self
            .endpoint
            .join(&id.path())
            .map_err(|e| VerifyError::Config {
                reason: format!("cannot build URL for {id}: {e}"),
            })?;
        url.query_pairs_mut()
            .append_pair("api-version", id.kind.api_version());
        Ok(url)
    }

    /// One HTTP exchange. Connection failures become retryable transport
    /// errors; a refused credential is a transport error that is not retried.
    async fn send_once(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        operation: &str,
        resource: &str,
    ) -> Result<RawResponse> {
        debug!(method = %method, url = %url, operation, "Resource manager request");

        let mut request = self.http.request(method, url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| VerifyError::Transport {
            operation: operation.to_string(),
            resource: resource.to_string(),
            status: None,
            reason: e.to_string(),
            correlation_id: None,
        })?;

        let status = response.status().as_u16();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        let async_operation = header(HEADER_ASYNC_OPERATION).or_else(|| header(HEADER_LOCATION));
        let correlation_id = header(HEADER_CORRELATION_ID);

        let body = response.text().await.map_err(|e| VerifyError::Transport {
            operation: operation.to_string(),
            resource: resource.to_string(),
            status: Some(status),
            reason: format!("failed to read response body: {e}"),
            correlation_id: correlation_id.clone(),
        })?;

        debug!(status, operation, resource, "Resource manager response");

        let raw = RawResponse {
            status,
            async_operation,
            correlation_id,
            body,
        };

        match classify_status(status) {
            ResponseClass::Success | ResponseClass::NotFound | ResponseClass::Rejected => Ok(raw),
            ResponseClass::AuthFailed | ResponseClass::Retryable | ResponseClass::Unexpected => {
                Err(transport_error(&raw, operation, resource))
            }
        }
    }

    /// [`send_once`](Self::send_once) wrapped in transport retry.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        operation: &str,
        resource: &str,
    ) -> Result<RawResponse> {
        let mut backoff = http_backoff();
        retry_http_call(
            &mut backoff,
            || self.send_once(method.clone(), url.clone(), body, operation, resource),
            operation,
        )
        .await
    }

    async fn mutate(
        &self,
        kind: OperationKind,
        method: Method,
        id: &ResourceId,
        body: Option<&Value>,
    ) -> Result<OperationHandle> {
        let resource = id.to_string();
        let url = self.url_for(id)?;
        let raw = self.send(method, url, body, kind.as_str(), &resource).await?;

        match classify_status(raw.status) {
            ResponseClass::Success => {}
            // Deleting something already gone completes immediately.
            ResponseClass::NotFound if kind == OperationKind::Delete => {
                return Ok(OperationHandle::new(kind, id.clone())
                    .with_initial_state(ProvisioningState::Succeeded));
            }
            _ => return Err(rejection_error(&raw, kind.as_str(), &resource)),
        }

        let mut handle = OperationHandle::new(kind, id.clone());
        if let Some(link) = raw.async_operation.as_deref() {
            let url = Url::parse(link).map_err(|e| VerifyError::Decode {
                what: format!("async operation URL for {resource}"),
                reason: e.to_string(),
            })?;
            handle = handle.with_status_url(url);
        }

        if kind == OperationKind::Delete && raw.status == 204 {
            handle = handle.with_initial_state(ProvisioningState::Succeeded);
        } else if let Some(state) = parse_json(&raw.body)
            .as_ref()
            .and_then(provisioning_state_of)
        {
            handle = handle.with_initial_state(state);
        }

        info!(
            operation = kind.as_str(),
            resource = %resource,
            status = raw.status,
            async_operation = handle.status_url().is_some(),
            "Operation accepted"
        );
        Ok(handle)
    }

    async fn get_url(&self, url: Url, operation: &str, resource: &str) -> Result<Value> {
        let raw = self.send(Method::GET, url, None, operation, resource).await?;
        match classify_status(raw.status) {
            ResponseClass::Success => decode_json(&raw.body, resource),
            ResponseClass::NotFound => Err(VerifyError::NotFound {
                resource: resource.to_string(),
            }),
            // A read the service refuses is not a resource-state signal.
            _ => Err(transport_error(&raw, operation, resource)),
        }
    }
}

#[async_trait]
impl ResourceClient for ArmClient {
    async fn create_or_update(&self, id: &ResourceId, body: &Value) -> Result<OperationHandle> {
        self.mutate(OperationKind::Create, Method::PUT, id, Some(body))
            .await
    }

    async fn update(&self, id: &ResourceId, patch: &Value) -> Result<OperationHandle> {
        self.mutate(OperationKind::Update, Method::PATCH, id, Some(patch))
            .await
    }

    async fn get(&self, id: &ResourceId) -> Result<Value> {
        let url = self.url_for(id)?;
        self.get_url(url, "get", &id.to_string()).await
    }

    async fn delete(&self, id: &ResourceId) -> Result<OperationHandle> {
        self.mutate(OperationKind::Delete, Method::DELETE, id, None)
            .await
    }

    async fn list(&self, collection: &ResourceId) -> Result<Vec<Value>> {
        let resource = collection.to_string();
        let mut next = Some(self.url_for(collection)?);
        let mut items = Vec::new();

        while let Some(url) = next.take() {
            let page = self.get_url(url, "list", &resource).await?;
            if let Some(values) = page.get("value").and_then(Value::as_array) {
                items.extend(values.iter().cloned());
            }
            next = match page.get("nextLink").and_then(Value::as_str) {
                Some(link) if !link.is_empty() => {
                    Some(Url::parse(link).map_err(|e| VerifyError::Decode {
                        what: format!("nextLink for {resource}"),
                        reason: e.to_string(),
                    })?)
                }
                _ => None,
            };
        }

        Ok(items)
    }

    async fn operation_status(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        let resource = handle.resource().to_string();
        let Some(url) = handle.status_url().cloned() else {
            return Err(VerifyError::Decode {
                what: format!("operation status for {resource}"),
                reason: "operation has no async status URL".to_string(),
            });
        };

        let raw = self
            .send(Method::GET, url, None, "operation status", &resource)
            .await?;
        match classify_status(raw.status) {
            ResponseClass::Success => {}
            ResponseClass::NotFound => return Err(VerifyError::NotFound { resource }),
            _ => return Err(transport_error(&raw, "operation status", &resource)),
        }
        if raw.status == 202 {
            return Ok(OperationStatus::in_progress());
        }

        match parse_json(&raw.body) {
            Some(value) if value.get("status").is_some() => {
                serde_json::from_value(value).map_err(|e| VerifyError::Decode {
                    what: format!("operation status for {resource}"),
                    reason: e.to_string(),
                })
            }
            // A finished Location poll returns the resource itself, or nothing.
            _ => Ok(OperationStatus::finished()),
        }
    }
}

fn parse_json(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    serde_json::from_str(body).ok()
}

fn decode_json(body: &str, resource: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| VerifyError::Decode {
        what: format!("response body for {resource}"),
        reason: e.to_string(),
    })
}

fn rejection_error(raw: &RawResponse, operation: &str, resource: &str) -> VerifyError {
    VerifyError::ImmediateRejection {
        operation: operation.to_string(),
        resource: resource.to_string(),
        status: raw.status,
        error: CloudErrorBody::from_response_body(raw.status, &raw.body),
        correlation_id: raw.correlation_id.clone(),
    }
}

fn transport_error(raw: &RawResponse, operation: &str, resource: &str) -> VerifyError {
    let (reason, summary) = map_http_error_to_reason(raw.status);
    let detail = CloudErrorBody::from_response_body(raw.status, &raw.body);
    VerifyError::Transport {
        operation: operation.to_string(),
        resource: resource.to_string(),
        status: Some(raw.status),
        reason: format!("{reason}: {summary}; {detail}"),
        correlation_id: raw.correlation_id.clone(),
    }
}
