// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource addressing.
//!
//! A [`ResourceId`] names one resource under a [`Scope`] and renders the
//! resource manager path for it. Node pools and external auths are children
//! of a cluster and carry the cluster name as their parent.

use crate::constants::{
    API_VERSION, CLUSTERS_SEGMENT, EXTERNAL_AUTHS_SEGMENT, NODE_POOLS_SEGMENT, PROVIDER_NAMESPACE,
    RESOURCE_GROUP_API_VERSION,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription and resource group under which a named resource is unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub subscription_id: String,
    pub resource_group: String,
}

impl Scope {
    pub fn new(subscription_id: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
        }
    }

    /// `/subscriptions/{sub}/resourceGroups/{rg}`
    #[must_use]
    pub fn path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )
    }
}

/// Kinds of resources the harness drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    ResourceGroup,
    Cluster,
    NodePool,
    ExternalAuth,
}

impl ResourceType {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::ResourceGroup => "ResourceGroup",
            ResourceType::Cluster => "Cluster",
            ResourceType::NodePool => "NodePool",
            ResourceType::ExternalAuth => "ExternalAuth",
        }
    }

    /// `api-version` sent for this kind.
    #[must_use]
    pub fn api_version(self) -> &'static str {
        match self {
            ResourceType::ResourceGroup => RESOURCE_GROUP_API_VERSION,
            _ => API_VERSION,
        }
    }

    #[must_use]
    pub fn requires_parent(self) -> bool {
        matches!(self, ResourceType::NodePool | ResourceType::ExternalAuth)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-qualified identity of one resource.
///
/// An empty `name` addresses the collection (used for list calls).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub scope: Scope,
    pub kind: ResourceType,
    /// Parent cluster name for node pools and external auths
    pub parent: Option<String>,
    pub name: String,
}

impl ResourceId {
    #[must_use]
    pub fn resource_group(scope: &Scope) -> Self {
        Self {
            scope: scope.clone(),
            kind: ResourceType::ResourceGroup,
            parent: None,
            name: scope.resource_group.clone(),
        }
    }

    pub fn cluster(scope: &Scope, name: impl Into<String>) -> Self {
        Self {
            scope: scope.clone(),
            kind: ResourceType::Cluster,
            parent: None,
            name: name.into(),
        }
    }

    pub fn node_pool(scope: &Scope, cluster: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.clone(),
            kind: ResourceType::NodePool,
            parent: Some(cluster.into()),
            name: name.into(),
        }
    }

    pub fn external_auth(
        scope: &Scope,
        cluster: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.clone(),
            kind: ResourceType::ExternalAuth,
            parent: Some(cluster.into()),
            name: name.into(),
        }
    }

    /// The collection this resource belongs to (same id with an empty name).
    #[must_use]
    pub fn collection(&self) -> Self {
        Self {
            name: String::new(),
            ..self.clone()
        }
    }

    /// Resource manager path, without host or query string.
    #[must_use]
    pub fn path(&self) -> String {
        let cluster_base = |cluster: &str| {
            format!(
                "{}/providers/{PROVIDER_NAMESPACE}/{CLUSTERS_SEGMENT}/{cluster}",
                self.scope.path()
            )
        };
        let parent = self.parent.as_deref().unwrap_or_default();

        let base = match self.kind {
            ResourceType::ResourceGroup => {
                if self.name.is_empty() {
                    return format!("/subscriptions/{}/resourcegroups", self.scope.subscription_id);
                }
                return self.scope.path();
            }
            ResourceType::Cluster => {
                format!("{}/providers/{PROVIDER_NAMESPACE}/{CLUSTERS_SEGMENT}", self.scope.path())
            }
            ResourceType::NodePool => format!("{}/{NODE_POOLS_SEGMENT}", cluster_base(parent)),
            ResourceType::ExternalAuth => {
                format!("{}/{EXTERNAL_AUTHS_SEGMENT}", cluster_base(parent))
            }
        };

        if self.name.is_empty() {
            base
        } else {
            format!("{base}/{}", self.name)
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new("sub-1", "rg-test")
    }

    #[test]
    fn test_resource_group_path() {
        let id = ResourceId::resource_group(&scope());
        assert_eq!(id.path(), "/subscriptions/sub-1/resourceGroups/rg-test");
        assert_eq!(id.kind.api_version(), RESOURCE_GROUP_API_VERSION);
    }

    #[test]
    fn test_resource_group_collection_path() {
        let id = ResourceId::resource_group(&scope()).collection();
        assert_eq!(id.path(), "/subscriptions/sub-1/resourcegroups");
    }

    #[test]
    fn test_cluster_path() {
        let id = ResourceId::cluster(&scope(), "c1");
        assert_eq!(
            id.path(),
            "/subscriptions/sub-1/resourceGroups/rg-test/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/c1"
        );
        assert_eq!(id.kind.api_version(), API_VERSION);
    }

    #[test]
    fn test_node_pool_path_and_collection() {
        let id = ResourceId::node_pool(&scope(), "c1", "np1");
        assert!(id.path().ends_with("/hcpOpenShiftClusters/c1/nodePools/np1"));
        assert!(id
            .collection()
            .path()
            .ends_with("/hcpOpenShiftClusters/c1/nodePools"));
        assert!(id.kind.requires_parent());
    }

    #[test]
    fn test_external_auth_path() {
        let id = ResourceId::external_auth(&scope(), "c1", "entra");
        assert!(id
            .to_string()
            .ends_with("/hcpOpenShiftClusters/c1/externalAuths/entra"));
    }
}
