// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ResourceClient`] for unit tests.
//!
//! Mutations succeed by default and complete through an async-operation
//! status URL (one in-progress status, then the terminal one). Tests can
//! register synchronous rejections or asynchronous failures per operation and
//! resource, or switch to resource-state polling with
//! [`FakeClient::without_status_urls`].

use crate::client::{OperationHandle, OperationKind, ResourceClient};
use crate::cloud_error::CloudErrorBody;
use crate::errors::{Result, VerifyError};
use crate::models::OperationStatus;
use crate::provisioning::ProvisioningState;
use crate::resource::ResourceId;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use url::Url;

/// Decides from the target, its current state and the request body whether
/// a mutation fails.
type Predicate = Box<dyn Fn(&ResourceId, Option<&Value>, &Value) -> bool + Send>;

struct Rule {
    kind: OperationKind,
    asynchronous: bool,
    predicate: Predicate,
    error: CloudErrorBody,
}

#[derive(Default)]
struct Inner {
    resources: BTreeMap<String, Value>,
    operations: HashMap<String, VecDeque<OperationStatus>>,
    rejections: HashMap<(OperationKind, String), CloudErrorBody>,
    async_failures: HashMap<(OperationKind, String), CloudErrorBody>,
    transient_states: HashMap<String, VecDeque<ProvisioningState>>,
    failing_deletes: Vec<String>,
    rules: Vec<Rule>,
    calls: Vec<String>,
    next_operation: u32,
    status_urls: bool,
}

pub(crate) struct FakeClient {
    inner: Mutex<Inner>,
}

impl FakeClient {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                status_urls: true,
                ..Inner::default()
            }),
        }
    }

    /// Complete mutations through the resource's own provisioning state.
    pub(crate) fn without_status_urls(self) -> Self {
        self.inner.lock().unwrap().status_urls = false;
        self
    }

    /// Insert an existing resource in the `Succeeded` state.
    pub(crate) fn seed(&self, id: &ResourceId, mut body: Value) {
        set_state(&mut body, &ProvisioningState::Succeeded);
        self.inner
            .lock()
            .unwrap()
            .resources
            .insert(key(id), body);
    }

    pub(crate) fn reject(&self, kind: OperationKind, id: &ResourceId, code: &str, message: &str) {
        self.inner
            .lock()
            .unwrap()
            .rejections
            .insert((kind, key(id)), CloudErrorBody::new(code, message));
    }

    pub(crate) fn fail_async(&self, kind: OperationKind, id: &ResourceId, code: &str, message: &str) {
        self.inner
            .lock()
            .unwrap()
            .async_failures
            .insert((kind, key(id)), CloudErrorBody::new(code, message));
    }

    /// Reject every `kind` request for which `predicate` holds.
    pub(crate) fn reject_when(
        &self,
        kind: OperationKind,
        code: &str,
        message: &str,
        predicate: impl Fn(&ResourceId, Option<&Value>, &Value) -> bool + Send + 'static,
    ) {
        self.add_rule(kind, false, code, message, Box::new(predicate));
    }

    /// Accept, then fail, every `kind` request for which `predicate` holds.
    pub(crate) fn fail_async_when(
        &self,
        kind: OperationKind,
        code: &str,
        message: &str,
        predicate: impl Fn(&ResourceId, Option<&Value>, &Value) -> bool + Send + 'static,
    ) {
        self.add_rule(kind, true, code, message, Box::new(predicate));
    }

    fn add_rule(
        &self,
        kind: OperationKind,
        asynchronous: bool,
        code: &str,
        message: &str,
        predicate: Predicate,
    ) {
        self.inner.lock().unwrap().rules.push(Rule {
            kind,
            asynchronous,
            predicate,
            error: CloudErrorBody::new(code, message),
        });
    }

    /// Make every delete of `id` fail at the transport layer.
    pub(crate) fn break_deletes(&self, id: &ResourceId) {
        self.inner.lock().unwrap().failing_deletes.push(key(id));
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub(crate) fn exists(&self, id: &ResourceId) -> bool {
        self.inner.lock().unwrap().resources.contains_key(&key(id))
    }

    pub(crate) fn resource(&self, id: &ResourceId) -> Option<Value> {
        self.inner.lock().unwrap().resources.get(&key(id)).cloned()
    }

    fn mutate(
        &self,
        kind: OperationKind,
        id: &ResourceId,
        request: &Value,
        apply: impl FnOnce(Option<Value>) -> Option<Value>,
    ) -> Result<OperationHandle> {
        let mut inner = self.inner.lock().unwrap();
        let path = key(id);
        inner.calls.push(format!("{kind} {}", id.path()));

        let current = inner.resources.get(&path).cloned();
        let matching = |asynchronous: bool| {
            inner
                .rules
                .iter()
                .find(|rule| {
                    rule.kind == kind
                        && rule.asynchronous == asynchronous
                        && (rule.predicate)(id, current.as_ref(), request)
                })
                .map(|rule| rule.error.clone())
        };
        let rejection = inner
            .rejections
            .get(&(kind, path.clone()))
            .cloned()
            .or_else(|| matching(false));
        let failure = inner
            .async_failures
            .get(&(kind, path.clone()))
            .cloned()
            .or_else(|| matching(true));
        if let Some(error) = rejection {
            return Err(VerifyError::ImmediateRejection {
                operation: kind.as_str().to_string(),
                resource: id.to_string(),
                status: 400,
                error,
                correlation_id: Some("fake-correlation".to_string()),
            });
        }
        if kind == OperationKind::Delete && inner.failing_deletes.contains(&path) {
            return Err(VerifyError::Transport {
                operation: kind.as_str().to_string(),
                resource: id.to_string(),
                status: Some(503),
                reason: "ServiceUnavailable".to_string(),
                correlation_id: None,
            });
        }
        if kind == OperationKind::Delete && !inner.resources.contains_key(&path) {
            return Ok(OperationHandle::new(kind, id.clone())
                .with_initial_state(ProvisioningState::Succeeded));
        }

        match (&failure, kind) {
            (Some(_), OperationKind::Delete) => {
                if let Some(mut existing) = current {
                    set_state(&mut existing, &ProvisioningState::Failed);
                    inner.resources.insert(path.clone(), existing);
                }
            }
            (Some(_), _) => {
                if let Some(mut next) = apply(current) {
                    set_state(&mut next, &ProvisioningState::Failed);
                    inner.resources.insert(path.clone(), next);
                }
            }
            (None, _) => match apply(current) {
                Some(mut next) => {
                    set_state(&mut next, &ProvisioningState::Succeeded);
                    inner.resources.insert(path.clone(), next);
                }
                None => {
                    inner.resources.remove(&path);
                }
            },
        }

        let handle = OperationHandle::new(kind, id.clone());
        if !inner.status_urls {
            let transient = match kind {
                OperationKind::Create => vec![ProvisioningState::Accepted, ProvisioningState::Provisioning],
                OperationKind::Update => vec![ProvisioningState::Updating],
                OperationKind::Delete => vec![],
            };
            inner.transient_states.insert(path, transient.into());
            return Ok(handle);
        }

        inner.next_operation += 1;
        let url = format!("https://fake.invalid/operations/op-{}", inner.next_operation);
        let terminal = OperationStatus {
            id: Some(url.clone()),
            name: Some(format!("op-{}", inner.next_operation)),
            status: if failure.is_some() {
                ProvisioningState::Failed
            } else {
                ProvisioningState::Succeeded
            },
            start_time: None,
            end_time: None,
            error: failure,
        };
        let in_progress = OperationStatus {
            status: ProvisioningState::Provisioning,
            error: None,
            ..terminal.clone()
        };
        inner
            .operations
            .insert(url.clone(), VecDeque::from(vec![in_progress, terminal]));
        Ok(handle.with_status_url(Url::parse(&url).unwrap()))
    }
}

#[async_trait]
impl ResourceClient for FakeClient {
    async fn create_or_update(&self, id: &ResourceId, body: &Value) -> Result<OperationHandle> {
        let stored = body.clone();
        self.mutate(OperationKind::Create, id, body, |_| Some(stored))
    }

    async fn update(&self, id: &ResourceId, patch: &Value) -> Result<OperationHandle> {
        self.mutate(OperationKind::Update, id, patch, |current| {
            let mut target = current.unwrap_or(Value::Null);
            merge_patch(&mut target, patch);
            Some(target)
        })
    }

    async fn get(&self, id: &ResourceId) -> Result<Value> {
        let mut inner = self.inner.lock().unwrap();
        let path = key(id);
        inner.calls.push(format!("get {}", id.path()));
        let Some(mut resource) = inner.resources.get(&path).cloned() else {
            return Err(VerifyError::NotFound {
                resource: id.to_string(),
            });
        };
        if let Some(state) = inner
            .transient_states
            .get_mut(&path)
            .and_then(VecDeque::pop_front)
        {
            set_state(&mut resource, &state);
        }
        Ok(resource)
    }

    async fn delete(&self, id: &ResourceId) -> Result<OperationHandle> {
        self.mutate(OperationKind::Delete, id, &Value::Null, |_| None)
    }

    async fn list(&self, collection: &ResourceId) -> Result<Vec<Value>> {
        let inner = self.inner.lock().unwrap();
        let prefix = format!("{}/", key(collection));
        Ok(inner
            .resources
            .iter()
            .filter(|(path, _)| {
                path.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn operation_status(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        let mut inner = self.inner.lock().unwrap();
        let url = handle.status_url().map(ToString::to_string).unwrap_or_default();
        inner.calls.push(format!("status {url}"));
        let queue = inner.operations.get_mut(&url).ok_or_else(|| VerifyError::Transport {
            operation: "operation status".to_string(),
            resource: url.clone(),
            status: Some(404),
            reason: "unknown operation".to_string(),
            correlation_id: None,
        })?;
        if queue.len() > 1 {
            return Ok(queue.pop_front().unwrap());
        }
        Ok(queue.front().cloned().unwrap())
    }
}

fn key(id: &ResourceId) -> String {
    id.path().to_lowercase()
}

fn set_state(resource: &mut Value, state: &ProvisioningState) {
    if resource.get("properties").is_some() {
        resource["properties"]["provisioningState"] = json!(state.as_str());
    }
}

/// JSON merge patch: `null` removes a member, objects merge recursively.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(members) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let object = target.as_object_mut().unwrap();
    for (name, value) in members {
        if value.is_null() {
            object.remove(name);
        } else {
            merge_patch(object.entry(name.clone()).or_insert(Value::Null), value);
        }
    }
}
