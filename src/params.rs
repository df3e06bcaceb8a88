// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Default request parameters and builders for cluster, node pool and
//! external auth bodies.
//!
//! Scenarios start from [`NodePoolParams::default_params`] or
//! [`ClusterParams::default_params`], override the one field they exercise,
//! and build the wire model with `build(location)`. External auths are
//! cluster children without a location and are built from
//! [`ExternalAuthParams::entra`].

use crate::models::{
    ApiProfile, Cluster, ClusterAutoscalingProfile, ClusterPlatformProfile, ClusterProperties,
    ExternalAuth, ExternalAuthClient, ExternalAuthProperties, NodePool, NodePoolAutoScaling,
    NodePoolPlatformProfile, NodePoolProperties, OsDiskProfile, TokenIssuerProfile, VersionProfile,
};
use serde_json::{json, Value};

pub const DEFAULT_OPENSHIFT_VERSION: &str = "4.19";
pub const DEFAULT_CHANNEL_GROUP: &str = "stable";
pub const DEFAULT_VM_SIZE: &str = "Standard_D8s_v3";
pub const DEFAULT_OS_DISK_SIZE_GIB: i32 = 64;
/// Overrides the service default of `Premium_LRS`
pub const DEFAULT_DISK_STORAGE_ACCOUNT_TYPE: &str = "StandardSSD_LRS";
pub const DEFAULT_REPLICAS: i32 = 2;
pub const DEFAULT_API_VISIBILITY: &str = "Public";
/// Entra ID v2 issuer, `{tenant}` replaced by the tenant id
pub const ENTRA_ISSUER_URL_TEMPLATE: &str = "https://login.microsoftonline.com/{tenant}/v2.0";
pub const DEFAULT_USERNAME_CLAIM: &str = "email";
pub const CONSOLE_COMPONENT_NAME: &str = "console";
pub const CONSOLE_COMPONENT_NAMESPACE: &str = "openshift-console";
pub const PUBLIC_CLIENT_TYPE: &str = "Public";

/// Inputs for one node pool request body.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePoolParams {
    pub cluster_name: String,
    pub node_pool_name: String,
    pub openshift_version_id: String,
    pub channel_group: String,
    pub vm_size: String,
    pub os_disk_size_gib: i32,
    pub disk_storage_account_type: String,
    /// Fixed replica count; mutually exclusive with `auto_scaling`
    pub replicas: Option<i32>,
    pub auto_scaling: Option<NodePoolAutoScaling>,
    pub auto_repair: bool,
    pub node_drain_timeout_minutes: Option<i32>,
    pub subnet_id: Option<String>,
}

impl NodePoolParams {
    #[must_use]
    pub fn default_params() -> Self {
        Self {
            cluster_name: String::new(),
            node_pool_name: String::new(),
            openshift_version_id: DEFAULT_OPENSHIFT_VERSION.to_string(),
            channel_group: DEFAULT_CHANNEL_GROUP.to_string(),
            vm_size: DEFAULT_VM_SIZE.to_string(),
            os_disk_size_gib: DEFAULT_OS_DISK_SIZE_GIB,
            disk_storage_account_type: DEFAULT_DISK_STORAGE_ACCOUNT_TYPE.to_string(),
            replicas: Some(DEFAULT_REPLICAS),
            auto_scaling: None,
            auto_repair: true,
            node_drain_timeout_minutes: None,
            subnet_id: None,
        }
    }

    #[must_use]
    pub fn named(mut self, cluster_name: impl Into<String>, node_pool_name: impl Into<String>) -> Self {
        self.cluster_name = cluster_name.into();
        self.node_pool_name = node_pool_name.into();
        self
    }

    #[must_use]
    pub fn build(&self, location: &str) -> NodePool {
        NodePool {
            location: location.to_string(),
            tags: Default::default(),
            properties: NodePoolProperties {
                provisioning_state: None,
                version: Some(VersionProfile {
                    id: self.openshift_version_id.clone(),
                    channel_group: self.channel_group.clone(),
                }),
                platform: NodePoolPlatformProfile {
                    subnet_id: self.subnet_id.clone(),
                    vm_size: self.vm_size.clone(),
                    enable_encryption_at_host: None,
                    os_disk: Some(OsDiskProfile {
                        size_gib: self.os_disk_size_gib,
                        disk_storage_account_type: self.disk_storage_account_type.clone(),
                    }),
                    availability_zone: None,
                },
                replicas: self.replicas,
                auto_scaling: self.auto_scaling,
                auto_repair: Some(self.auto_repair),
                node_drain_timeout_minutes: self.node_drain_timeout_minutes,
                labels: Default::default(),
                taints: Vec::new(),
            },
        }
    }
}

/// Inputs for one cluster request body.
///
/// Network and identity resources are provisioned outside the harness and
/// referenced by id.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterParams {
    pub cluster_name: String,
    pub openshift_version_id: String,
    pub channel_group: String,
    pub managed_resource_group_name: String,
    pub subnet_resource_id: String,
    pub nsg_resource_id: String,
    pub api_visibility: String,
    pub authorized_cidrs: Vec<String>,
    pub identity: Option<Value>,
    pub operators_authentication: Option<Value>,
    pub autoscaling: Option<ClusterAutoscalingProfile>,
}

impl ClusterParams {
    #[must_use]
    pub fn default_params() -> Self {
        Self {
            cluster_name: String::new(),
            openshift_version_id: DEFAULT_OPENSHIFT_VERSION.to_string(),
            channel_group: DEFAULT_CHANNEL_GROUP.to_string(),
            managed_resource_group_name: String::new(),
            subnet_resource_id: String::new(),
            nsg_resource_id: String::new(),
            api_visibility: DEFAULT_API_VISIBILITY.to_string(),
            authorized_cidrs: Vec::new(),
            identity: None,
            operators_authentication: None,
            autoscaling: None,
        }
    }

    #[must_use]
    pub fn build(&self, location: &str) -> Cluster {
        let managed_resource_group = if self.managed_resource_group_name.is_empty() {
            None
        } else {
            Some(self.managed_resource_group_name.clone())
        };
        Cluster {
            location: location.to_string(),
            tags: Default::default(),
            identity: self.identity.clone(),
            properties: ClusterProperties {
                provisioning_state: None,
                version: Some(VersionProfile {
                    id: self.openshift_version_id.clone(),
                    channel_group: self.channel_group.clone(),
                }),
                platform: ClusterPlatformProfile {
                    managed_resource_group,
                    subnet_id: self.subnet_resource_id.clone(),
                    network_security_group_id: self.nsg_resource_id.clone(),
                    outbound_type: None,
                    operators_authentication: self.operators_authentication.clone(),
                },
                api: Some(ApiProfile {
                    visibility: Some(self.api_visibility.clone()),
                    authorized_cidrs: self.authorized_cidrs.clone(),
                }),
                autoscaling: self.autoscaling.clone(),
                node_drain_timeout_minutes: None,
            },
        }
    }
}

/// Inputs for one external auth request body.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalAuthParams {
    pub issuer_url: String,
    pub audiences: Vec<String>,
    /// Console client registered under the same id as the audience
    pub client_id: String,
    pub username_claim: String,
}

impl ExternalAuthParams {
    /// Entra ID issuer for `tenant_id` accepting tokens for `client_id`.
    #[must_use]
    pub fn entra(tenant_id: &str, client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self {
            issuer_url: ENTRA_ISSUER_URL_TEMPLATE.replace("{tenant}", tenant_id),
            audiences: vec![client_id.clone()],
            client_id,
            username_claim: DEFAULT_USERNAME_CLAIM.to_string(),
        }
    }

    #[must_use]
    pub fn build(&self) -> ExternalAuth {
        ExternalAuth {
            properties: ExternalAuthProperties {
                provisioning_state: None,
                issuer: TokenIssuerProfile {
                    url: self.issuer_url.clone(),
                    audiences: self.audiences.clone(),
                },
                clients: vec![ExternalAuthClient {
                    client_id: self.client_id.clone(),
                    component: json!({
                        "name": CONSOLE_COMPONENT_NAME,
                        "authClientNamespace": CONSOLE_COMPONENT_NAMESPACE,
                    }),
                    client_type: PUBLIC_CLIENT_TYPE.to_string(),
                }],
                claim: Some(json!({
                    "mappings": { "username": { "claim": self.username_claim } }
                })),
            },
        }
    }
}
