// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Removal of expired resource groups.
//!
//! Scenario resource groups carry a `deleteAfter` tag. Runs that crash or are
//! killed never reach their own cleanup, so a periodic sweep lists the
//! subscription's resource groups created by this harness and deletes those
//! whose tag lies in the past. Groups with a missing or unparseable tag are
//! left alone.

use crate::client::ResourceClient;
use crate::config::HarnessConfig;
use crate::constants::{CREATED_BY_TAG, CREATED_BY_VALUE, DELETE_AFTER_TAG};
use crate::errors::Result;
use crate::harness::CleanupFailure;
use crate::metrics;
use crate::models::ResourceGroup;
use crate::resource::{ResourceId, ResourceType, Scope};
use crate::submitter::{OperationSubmitter, SubmitRequest};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A resource group past its `deleteAfter` time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredGroup {
    pub name: String,
    pub delete_after: DateTime<Utc>,
}

/// What a sweep deleted and what it could not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    pub deleted: Vec<String>,
    pub failed: Vec<CleanupFailure>,
}

/// Harness-created groups in `groups` whose expiry is before `now`.
#[must_use]
pub fn expired_resource_groups(groups: &[Value], now: DateTime<Utc>) -> Vec<ExpiredGroup> {
    groups
        .iter()
        .filter_map(|value| serde_json::from_value::<ResourceGroup>(value.clone()).ok())
        .filter(|group| {
            group.tags.get(CREATED_BY_TAG).map(String::as_str) == Some(CREATED_BY_VALUE)
        })
        .filter_map(|group| {
            let name = group.name?;
            let raw = group.tags.get(DELETE_AFTER_TAG)?;
            match DateTime::parse_from_rfc3339(raw) {
                Ok(parsed) => Some(ExpiredGroup {
                    name,
                    delete_after: parsed.with_timezone(&Utc),
                }),
                Err(e) => {
                    debug!(
                        resource_group = %name,
                        tag = %raw,
                        error = %e,
                        "Skipping unparseable expiry tag"
                    );
                    None
                }
            }
        })
        .filter(|group| group.delete_after < now)
        .collect()
}

/// Delete every expired harness resource group in the subscription.
///
/// Deletions run concurrently, at most `parallelism` at a time. A failed
/// deletion is recorded in the summary and does not stop the sweep.
///
/// # Errors
///
/// Returns an error only when the resource groups cannot be listed or the
/// delete timeout is invalid.
pub async fn cleanup_expired(
    client: Arc<dyn ResourceClient>,
    config: &HarnessConfig,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<CleanupSummary> {
    let collection = ResourceId::resource_group(&Scope::new(config.subscription_id.clone(), ""));
    let groups = client.list(&collection).await?;
    let expired = expired_resource_groups(&groups, now);
    info!(
        listed = groups.len(),
        expired = expired.len(),
        "Found expired resource groups"
    );

    let timeout = config.poll_config(config.timeouts.delete_secs)?;
    let submitter = OperationSubmitter::new(client);
    let scope = |name: &str| Scope::new(config.subscription_id.clone(), name);

    let outcomes: Vec<(String, Result<()>)> = stream::iter(expired)
        .map(|group| {
            let id = ResourceId::resource_group(&scope(&group.name));
            let submitter = submitter.clone();
            async move {
                info!(
                    resource_group = %group.name,
                    delete_after = %group.delete_after,
                    "Deleting expired resource group"
                );
                let outcome = submitter
                    .submit_and_wait(SubmitRequest::delete(id), timeout, cancel)
                    .await
                    .and_then(|result| result.into_success("delete", &group.name))
                    .map(|_| ());
                (group.name, outcome)
            }
        })
        .buffer_unordered(config.parallelism.max(1))
        .collect()
        .await;

    let mut summary = CleanupSummary::default();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(()) => summary.deleted.push(name),
            Err(e) => {
                warn!(resource_group = %name, error = %e, "Failed to delete expired resource group");
                metrics::record_cleanup_failure(ResourceType::ResourceGroup.as_str());
                summary.failed.push(CleanupFailure {
                    resource: name,
                    error: e.to_string(),
                });
            }
        }
    }
    summary.deleted.sort();
    summary.failed.sort_by(|a, b| a.resource.cmp(&b.resource));
    Ok(summary)
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod cleanup_tests;
