// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the convergence verifier.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Resource Manager API Constants
// ============================================================================

/// API version sent as the `api-version` query parameter on every request
pub const API_VERSION: &str = "2024-06-10-preview";

/// API version used for resource group operations
pub const RESOURCE_GROUP_API_VERSION: &str = "2021-04-01";

/// Resource provider namespace for hosted control plane clusters
pub const PROVIDER_NAMESPACE: &str = "Microsoft.RedHatOpenShift";

/// Resource type segment for clusters
pub const CLUSTERS_SEGMENT: &str = "hcpOpenShiftClusters";

/// Resource type segment for node pools (child of a cluster)
pub const NODE_POOLS_SEGMENT: &str = "nodePools";

/// Resource type segment for external auth configurations (child of a cluster)
pub const EXTERNAL_AUTHS_SEGMENT: &str = "externalAuths";

/// Default public resource manager endpoint
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

/// Frontend address used in development environments when none is configured
pub const DEFAULT_DEVELOPMENT_ENDPOINT: &str = "http://localhost:8443";

// ============================================================================
// HTTP Header Constants
// ============================================================================

/// Header carrying the async operation status URL of a long-running operation
pub const HEADER_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Fallback header for long-running operations without an async operation URL
pub const HEADER_LOCATION: &str = "location";

/// Correlation id echoed by the resource manager, attached to error reports
pub const HEADER_CORRELATION_ID: &str = "x-ms-correlation-request-id";

/// Per-request timeout for a single HTTP call (seconds)
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Polling Constants
// ============================================================================

/// Standard interval between status fetches (10 seconds)
pub const STANDARD_POLL_INTERVAL_SECS: u64 = 10;

/// Default timeout for cluster create operations (45 minutes)
pub const CLUSTER_CREATE_TIMEOUT_SECS: u64 = 45 * 60;

/// Default timeout for node pool create/update operations (45 minutes)
pub const NODE_POOL_TIMEOUT_SECS: u64 = 45 * 60;

/// Default timeout for delete operations (30 minutes)
pub const DELETE_TIMEOUT_SECS: u64 = 30 * 60;

/// Default timeout for resource group create operations (5 minutes)
pub const RESOURCE_GROUP_TIMEOUT_SECS: u64 = 5 * 60;

/// Default overall deadline for a single scenario (2 hours)
pub const SCENARIO_DEADLINE_SECS: u64 = 2 * 60 * 60;

/// Longest poll timeout or scenario deadline accepted (24 hours)
pub const MAX_POLL_TIMEOUT_SECS: u64 = 24 * 60 * 60;

// ============================================================================
// Naming and Cleanup Constants
// ============================================================================

/// Maximum length of a resource group name
pub const MAX_RESOURCE_GROUP_NAME_LEN: usize = 64;

/// Maximum length of a node pool name
pub const MAX_NODE_POOL_NAME_LEN: usize = 15;

/// Maximum length of an external auth name
pub const MAX_EXTERNAL_AUTH_NAME_LEN: usize = 15;

/// Length of the random suffix appended to per-run resource names
pub const RANDOM_SUFFIX_LEN: usize = 6;

/// Tag holding the RFC 3339 time after which a resource group may be reaped
pub const DELETE_AFTER_TAG: &str = "deleteAfter";

/// Tag identifying resource groups created by this harness
pub const CREATED_BY_TAG: &str = "createdBy";

/// Value of [`CREATED_BY_TAG`]
pub const CREATED_BY_VALUE: &str = "hcpverify";

/// Default resource group expiration (4 hours)
pub const RESOURCE_GROUP_EXPIRATION_SECS: i64 = 4 * 60 * 60;

/// Longest resource group expiration accepted (30 days)
pub const MAX_RESOURCE_GROUP_EXPIRATION_SECS: i64 = 30 * 24 * 60 * 60;

/// Default number of scenarios run concurrently
pub const DEFAULT_PARALLELISM: usize = 4;
