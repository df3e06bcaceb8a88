// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire models for the resources the harness drives.
//!
//! Only the fields scenarios build or assert on are modeled; unknown fields are
//! ignored on read. Read-only fields (`provisioningState`, `systemData`) are
//! skipped when absent so request bodies stay minimal.

use crate::cloud_error::CloudErrorBody;
use crate::provisioning::ProvisioningState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Operation Status
// ============================================================================

/// Status document served at an async operation URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub status: ProvisioningState,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<CloudErrorBody>,
}

impl OperationStatus {
    /// Status of an operation still running behind a `Location` URL.
    #[must_use]
    pub fn in_progress() -> Self {
        Self::bare(ProvisioningState::Provisioning)
    }

    /// Status of an operation a `Location` URL reports as done.
    #[must_use]
    pub fn finished() -> Self {
        Self::bare(ProvisioningState::Succeeded)
    }

    fn bare(status: ProvisioningState) -> Self {
        Self {
            id: None,
            name: None,
            status,
            start_time: None,
            end_time: None,
            error: None,
        }
    }
}

/// What one status fetch reports to the poller.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub state: ProvisioningState,
    /// The resource (or operation status) representation as returned
    pub payload: Value,
    pub error: Option<CloudErrorBody>,
}

impl Observation {
    /// Observation of a resource body, reading `properties.provisioningState`.
    ///
    /// A body without a provisioning state is treated as `Succeeded`: resource
    /// groups and plain reads report no state once they exist.
    #[must_use]
    pub fn from_resource(payload: Value) -> Self {
        let state = provisioning_state_of(&payload).unwrap_or(ProvisioningState::Succeeded);
        Self {
            state,
            payload,
            error: None,
        }
    }

    #[must_use]
    pub fn from_operation(status: OperationStatus, payload: Value) -> Self {
        Self {
            state: status.status,
            payload,
            error: status.error,
        }
    }
}

/// Read `properties.provisioningState` from a resource body.
#[must_use]
pub fn provisioning_state_of(payload: &Value) -> Option<ProvisioningState> {
    payload
        .pointer("/properties/provisioningState")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

// ============================================================================
// Resource Group
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub location: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

// ============================================================================
// Node Pool
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePool {
    pub location: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    pub properties: NodePoolProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionProfile>,
    pub platform: NodePoolPlatformProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scaling: Option<NodePoolAutoScaling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_repair: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_drain_timeout_minutes: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionProfile {
    pub id: String,
    pub channel_group: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolPlatformProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    pub vm_size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_encryption_at_host: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_disk: Option<OsDiskProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsDiskProfile {
    #[serde(rename = "sizeGiB")]
    pub size_gib: i32,
    pub disk_storage_account_type: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolAutoScaling {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub effect: String,
}

// ============================================================================
// Cluster
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub location: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Managed service identity block, passed through as sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Value>,
    pub properties: ClusterProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionProfile>,
    pub platform: ClusterPlatformProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<ClusterAutoscalingProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_drain_timeout_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPlatformProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_resource_group: Option<String>,
    pub subnet_id: String,
    pub network_security_group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_type: Option<String>,
    /// Operator identity assignments, passed through as sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operators_authentication: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorized_cidrs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAutoscalingProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes_total: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pod_grace_period_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_node_provision_time_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_priority_threshold: Option<i32>,
}

// ============================================================================
// External Auth
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAuth {
    pub properties: ExternalAuthProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAuthProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    pub issuer: TokenIssuerProfile,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clients: Vec<ExternalAuthClient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenIssuerProfile {
    pub url: String,
    pub audiences: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAuthClient {
    pub client_id: String,
    pub component: Value,
    #[serde(rename = "type")]
    pub client_type: String,
}
